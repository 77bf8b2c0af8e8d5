use crate::hash::{HashFamily, TableKey};
use crate::{DataPointSlice, Result};
use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Ids sharing one table key within one table.
///
/// Ids are caller-assigned and not required to be unique, so a bucket is a
/// plain list and may hold the same id more than once. Queries deduplicate
/// per call.
pub type Bucket = Vec<u64>;

type HashTable = HashMap<TableKey, Bucket>;

/// The original LSH index for L2 distance: one hash table per hash group.
///
/// `FlatIndex` cannot bound how many candidates a query returns and performs
/// no ranking. It is the building block for callers (and for
/// [`MultiprobeIndex`](crate::MultiprobeIndex)) that impose their own
/// k-selection on top.
#[derive(Serialize, Deserialize)]
pub struct FlatIndex {
    family: HashFamily,
    tables: Vec<HashTable>,
}

impl FlatIndex {
    /// Create a flat LSH index for L2 distance.
    ///
    /// # Arguments
    /// * `dim` - Dimensionality of the data points.
    /// * `l` - Number of hash tables.
    /// * `m` - Number of hash values concatenated per table key.
    /// * `w` - Bucket width of the hash functions.
    pub fn new(dim: usize, l: usize, m: usize, w: f32) -> Result<Self> {
        Self::with_seed(dim, l, m, w, 0)
    }

    /// Like [`new`](Self::new), with reproducible randomness.
    pub fn with_seed(dim: usize, l: usize, m: usize, w: f32, seed: u64) -> Result<Self> {
        let family = HashFamily::with_seed(dim, l, m, w, seed)?;
        let tables = vec![HashTable::default(); l];
        Ok(FlatIndex { family, tables })
    }

    pub fn family(&self) -> &HashFamily {
        &self.family
    }

    /// Add a data point under a caller-assigned id.
    ///
    /// The `l` table updates run as one parallel task per table over
    /// disjointly owned tables and are joined before this call returns.
    pub fn insert(&mut self, point: &DataPointSlice, id: u64) -> Result<()> {
        let keys = self.family.hash(point)?;
        self.tables
            .par_iter_mut()
            .zip(keys)
            .for_each(|(table, key)| table.entry(key).or_insert_with(Bucket::new).push(id));
        Ok(())
    }

    /// Return the ids of approximate nearest neighbour candidates, unordered
    /// and deduplicated within this call.
    pub fn query(&self, point: &DataPointSlice) -> Result<Vec<u64>> {
        let keys = self.family.hash(point)?;
        let mut seen = HashSet::default();
        let mut out = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            self.probe_bucket(i, key, &mut seen, &mut out);
        }
        Ok(out)
    }

    /// Drain one bucket into `out`, skipping ids already seen in this call.
    pub(crate) fn probe_bucket(
        &self,
        table: usize,
        key: &TableKey,
        seen: &mut HashSet<u64>,
        out: &mut Vec<u64>,
    ) {
        if let Some(bucket) = self.tables[table].get(key) {
            for &id in bucket {
                if seen.insert(id) {
                    out.push(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_self_recall() {
        let mut index = FlatIndex::with_seed(3, 10, 5, 4., 1).unwrap();
        index.insert(&[2., 3., 4.], 0).unwrap();
        index.insert(&[-1., -1., 1.], 1).unwrap();
        assert!(index.query(&[2., 3., 4.]).unwrap().contains(&0));
        assert!(index.query(&[-1., -1., 1.]).unwrap().contains(&1));
    }

    #[test]
    fn test_duplicate_id_emitted_once() {
        let mut index = FlatIndex::with_seed(3, 10, 2, 4., 1).unwrap();
        // same id under the same point twice: every bucket holds it twice
        index.insert(&[2., 3., 4.], 7).unwrap();
        index.insert(&[2., 3., 4.], 7).unwrap();
        let hits = index.query(&[2., 3., 4.]).unwrap();
        assert_eq!(hits.iter().filter(|&&id| id == 7).count(), 1);
    }

    #[test]
    fn test_empty_bucket() {
        let index = FlatIndex::with_seed(3, 4, 3, 1., 1).unwrap();
        assert!(index.query(&[5., 5., 5.]).unwrap().is_empty());
    }

    #[test]
    fn test_insert_wrong_dim_mutates_nothing() {
        let mut index = FlatIndex::with_seed(3, 4, 3, 1., 1).unwrap();
        assert!(index.insert(&[1., 2.], 0).is_err());
        assert!(index.tables.iter().all(|t| t.is_empty()));
    }
}
