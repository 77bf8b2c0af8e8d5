use crate::hash::{HashFamily, TableKey};
use crate::index::flat::FlatIndex;
use crate::utils::create_rng;
use crate::{DataPointSlice, Error, Result};
use fnv::FnvHashSet as HashSet;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};

/// A perturbation set: which of the `2m` perturbation units of a table key
/// to apply, plus the set's precomputed score.
///
/// Unit `u < m` steps the hash component ranked `u` one slot down, unit
/// `u >= m` steps the complementary component one slot up. Lower score means
/// a higher estimated chance of still colliding with a true neighbour.
#[derive(Debug, Clone)]
struct PerturbSet {
    units: Vec<usize>,
    score: f64,
}

impl PerturbSet {
    fn new(units: Vec<usize>, scores: &[f64]) -> Self {
        let score = units.iter().map(|&u| scores[u]).sum();
        PerturbSet { units, score }
    }

    /// A set that perturbs the same component in both directions can never
    /// match anything.
    fn is_valid(&self, m: usize) -> bool {
        self.units
            .iter()
            .all(|&u| !self.units.contains(&(2 * m - 1 - u)))
    }
}

// Min-heap ordering on the score. Scores are finite by construction.
impl Ord for PerturbSet {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(CmpOrdering::Equal)
    }
}

impl PartialOrd for PerturbSet {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PerturbSet {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl Eq for PerturbSet {}

/// Static expected squared offsets of the `2m` perturbation units, in
/// ascending order. Lv et al. (2007), section 4.5.
fn unit_scores(m: usize, w: f32) -> Vec<f64> {
    let m_ = m as f64;
    let w2 = (w as f64).powi(2);
    (1..=2 * m)
        .map(|j| {
            let j_ = j as f64;
            if j <= m {
                j_ * (j_ + 1.) / (4. * (m_ + 1.) * (m_ + 2.)) * w2
            } else {
                let r = 2. * m_ + 1. - j_;
                w2 * (1. - r / (m_ + 1.) + r * (r + 1.) / (4. * (m_ + 1.) * (m_ + 2.)))
            }
        })
        .collect()
}

/// Enumerate up to `n_probes` valid perturbation sets, best score first,
/// with the shift/expand heap generation of Lv et al.
fn perturbation_sets(m: usize, w: f32, n_probes: usize) -> Vec<PerturbSet> {
    let scores = unit_scores(m, w);
    let mut heap = BinaryHeap::new();
    if n_probes > 0 {
        heap.push(PerturbSet::new(vec![0], &scores));
    }

    let mut sets = Vec::with_capacity(n_probes);
    while sets.len() < n_probes {
        let set = match heap.pop() {
            Some(set) => set,
            None => break,
        };
        // units are kept sorted ascending, so the last one is the maximum
        let max = *set.units.last().unwrap();
        if max + 1 < 2 * m {
            let mut shifted = set.units.clone();
            *shifted.last_mut().unwrap() = max + 1;
            heap.push(PerturbSet::new(shifted, &scores));
            let mut expanded = set.units.clone();
            expanded.push(max + 1);
            heap.push(PerturbSet::new(expanded, &scores));
        }
        if set.is_valid(m) {
            sets.push(set);
        }
    }
    sets
}

/// Render a perturbation set into a per-component delta for one table, given
/// that table's unit-rank to component assignment.
fn render_delta(units: &[usize], perm: &[usize], m: usize) -> TableKey {
    let mut delta = vec![0; m];
    for &u in units {
        if u < m {
            delta[perm[u]] -= 1;
        } else {
            delta[perm[2 * m - 1 - u]] += 1;
        }
    }
    delta
}

/// Multi-probe LSH index for L2 distance, after Lv et al.
///
/// Wraps a [`FlatIndex`] and amplifies recall at query time by also probing
/// buckets adjacent to the query's own, best perturbation first, instead of
/// growing `l` or `m`. Inserts are delegated to the base index unchanged.
#[derive(Serialize, Deserialize)]
pub struct MultiprobeIndex {
    base: FlatIndex,
    /// Probing budget: the number of perturbation sets available per query.
    n_probes: usize,
    /// Per perturbation set, per table: the delta added to the query's key.
    perturb_vecs: Vec<Vec<TableKey>>,
    /// Score per perturbation set, ascending.
    scores: Vec<f64>,
}

impl MultiprobeIndex {
    /// Create a multi-probe LSH index for L2 distance.
    ///
    /// # Arguments
    /// * `dim` - Dimensionality of the data points.
    /// * `l` - Number of hash tables.
    /// * `m` - Number of hash values concatenated per table key.
    /// * `w` - Bucket width of the hash functions.
    /// * `n_probes` - Number of perturbation sets generated at construction
    ///   and thus the probing budget of [`query_k`](Self::query_k).
    pub fn new(dim: usize, l: usize, m: usize, w: f32, n_probes: usize) -> Result<Self> {
        Self::with_seed(dim, l, m, w, n_probes, 0)
    }

    /// Like [`new`](Self::new), with reproducible randomness.
    pub fn with_seed(
        dim: usize,
        l: usize,
        m: usize,
        w: f32,
        n_probes: usize,
        seed: u64,
    ) -> Result<Self> {
        let base = FlatIndex::with_seed(dim, l, m, w, seed)?;
        let sets = perturbation_sets(m, w, n_probes);

        // Per table, a random assignment of unit ranks to hash components.
        let mut rng = create_rng(seed);
        let perms: Vec<Vec<usize>> = (0..l)
            .map(|_| {
                let mut perm: Vec<usize> = (0..m).collect();
                perm.shuffle(&mut rng);
                perm
            })
            .collect();

        let perturb_vecs = sets
            .iter()
            .map(|set| {
                perms
                    .iter()
                    .map(|perm| render_delta(&set.units, perm, m))
                    .collect()
            })
            .collect();
        let scores = sets.iter().map(|set| set.score).collect();

        Ok(MultiprobeIndex {
            base,
            n_probes,
            perturb_vecs,
            scores,
        })
    }

    pub fn family(&self) -> &HashFamily {
        self.base.family()
    }

    /// The wrapped flat index.
    pub fn base(&self) -> &FlatIndex {
        &self.base
    }

    /// Scores of the generated perturbation sets, best (lowest) first.
    pub fn probe_scores(&self) -> &[f64] {
        &self.scores
    }

    /// The probing budget requested at construction. The number of usable
    /// perturbation sets may be smaller when `m` admits fewer valid sets.
    pub fn n_probes(&self) -> usize {
        self.n_probes
    }

    /// Add a data point under a caller-assigned id. Multi-probing only
    /// affects queries, so this delegates to the base index unchanged.
    pub fn insert(&mut self, point: &DataPointSlice, id: u64) -> Result<()> {
        self.base.insert(point, id)
    }

    /// Return candidate ids for the top-k approximate nearest neighbours,
    /// in discovery order, deduplicated within this call.
    ///
    /// The query's own buckets are probed first. While fewer than `k`
    /// unique candidates have been found and budget remains, the next-best
    /// perturbation set is applied across all tables. May return fewer than
    /// `k` ids when the budget runs out; never ranks by distance.
    pub fn query_k(&self, point: &DataPointSlice, k: usize) -> Result<Vec<u64>> {
        self.query_k_inner(point, k, None)
    }

    /// Like [`query_k`](Self::query_k); aborts with [`Error::Cancelled`]
    /// when `cancel` is raised between perturbation rounds.
    pub fn query_k_cancellable(
        &self,
        point: &DataPointSlice,
        k: usize,
        cancel: &AtomicBool,
    ) -> Result<Vec<u64>> {
        self.query_k_inner(point, k, Some(cancel))
    }

    fn query_k_inner(
        &self,
        point: &DataPointSlice,
        k: usize,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<u64>> {
        let keys = self.family().hash(point)?;
        let mut seen = HashSet::default();
        let mut out = Vec::new();

        // the exact buckets always come first
        for (i, key) in keys.iter().enumerate() {
            self.base.probe_bucket(i, key, &mut seen, &mut out);
        }

        for per_table in &self.perturb_vecs {
            if out.len() >= k {
                break;
            }
            if let Some(token) = cancel {
                if token.load(Ordering::Relaxed) {
                    return Err(Error::Cancelled);
                }
            }
            for (i, (key, delta)) in keys.iter().zip(per_table).enumerate() {
                let probed: TableKey = key.iter().zip(delta).map(|(&a, &b)| a + b).collect();
                self.base.probe_bucket(i, &probed, &mut seen, &mut out);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unit_scores_ascending() {
        for &m in &[1usize, 2, 5, 8] {
            let scores = unit_scores(m, 5.);
            assert_eq!(scores.len(), 2 * m);
            assert!(scores.windows(2).all(|s| s[0] < s[1]));
            assert!(scores.iter().all(|&s| s > 0. && s < 25.));
        }
    }

    #[test]
    fn test_perturbation_sets() {
        let m = 5;
        let sets = perturbation_sets(m, 5., 64);
        assert_eq!(sets.len(), 64);
        // best score first, no duplicates, no self-cancelling sets
        assert!(sets.windows(2).all(|s| s[0].score <= s[1].score));
        for set in &sets {
            assert!(set.is_valid(m));
            assert!(!set.units.is_empty());
            assert!(set.units.iter().all(|&u| u < 2 * m));
            assert!(set.units.windows(2).all(|u| u[0] < u[1]));
        }
        // the single cheapest unit must come first
        assert_eq!(sets[0].units, vec![0]);
    }

    #[test]
    fn test_perturbation_sets_exhausted() {
        // m = 1 has only two valid sets: {down} and {up}
        let sets = perturbation_sets(1, 5., 10);
        assert_eq!(sets.len(), 2);
    }

    #[test]
    fn test_render_delta() {
        let m = 3;
        let perm = vec![2, 0, 1];
        // unit 0: rank 0 -> component 2, one slot down
        assert_eq!(render_delta(&[0], &perm, m), vec![0, 0, -1]);
        // unit 5 complements unit 0: same component, one slot up
        assert_eq!(render_delta(&[5], &perm, m), vec![0, 0, 1]);
        assert_eq!(render_delta(&[1, 5], &perm, m), vec![-1, 0, 1]);
    }

    #[test]
    fn test_construction() {
        let index = MultiprobeIndex::with_seed(100, 5, 5, 5., 64, 1).unwrap();
        assert_eq!(index.family().n_tables(), 5);
        assert_eq!(index.n_probes(), 64);
        assert_eq!(index.probe_scores().len(), 64);
        assert_eq!(index.perturb_vecs.len(), 64);
        for per_table in &index.perturb_vecs {
            assert_eq!(per_table.len(), 5);
            for delta in per_table {
                assert_eq!(delta.len(), 5);
                assert!(delta.iter().all(|&d| (-1..=1).contains(&d)));
                assert!(delta.iter().any(|&d| d != 0));
            }
        }
    }

    #[test]
    fn test_zero_probe_budget() {
        let mut index = MultiprobeIndex::with_seed(3, 4, 3, 4., 0, 1).unwrap();
        index.insert(&[2., 3., 4.], 0).unwrap();
        // only the exact buckets are probed
        assert!(index.query_k(&[2., 3., 4.], 10).unwrap().contains(&0));
    }

    #[test]
    fn test_cancellation() {
        let index = MultiprobeIndex::with_seed(3, 4, 3, 4., 8, 1).unwrap();
        let cancel = AtomicBool::new(true);
        // empty index: the exact buckets yield nothing, so the perturbation
        // rounds start and observe the token
        assert!(matches!(
            index.query_k_cancellable(&[2., 3., 4.], 10, &cancel),
            Err(Error::Cancelled)
        ));
        let cancel = AtomicBool::new(false);
        assert!(index
            .query_k_cancellable(&[2., 3., 4.], 10, &cancel)
            .is_ok());
    }
}
