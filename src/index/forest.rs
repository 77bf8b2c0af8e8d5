use crate::hash::{HashFamily, HashPrimitive, TableKey};
use crate::{DataPointSlice, Error, Result};
use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

const ROOT: usize = 0;

/// One trie node, stored in its tree's arena and addressed by index.
#[derive(Serialize, Deserialize)]
struct TreeNode {
    /// Hash component that led to this node. Meaningless for the root.
    hash: HashPrimitive,
    /// Children keyed by the next hash component; values are arena indices.
    children: HashMap<HashPrimitive, usize>,
    /// Ids stored at this node. Non-empty only at full depth `m`.
    ids: Vec<u64>,
}

impl TreeNode {
    fn new(hash: HashPrimitive) -> Self {
        TreeNode {
            hash,
            children: HashMap::default(),
            ids: Vec::new(),
        }
    }
}

/// Prefix tree over table keys, one level per hash component.
///
/// Nodes live in a flat arena, so the tree needs no recursive teardown (the
/// arena drop reclaims everything) and descent is a loop bounded by `m`.
#[derive(Serialize, Deserialize)]
struct PrefixTree {
    nodes: Vec<TreeNode>,
    /// Number of distinct full-depth paths ever created in this tree.
    count: usize,
}

impl PrefixTree {
    fn new() -> Self {
        PrefixTree {
            nodes: vec![TreeNode::new(0)],
            count: 0,
        }
    }

    /// Descend along `key`, creating nodes lazily, and store `id` at full
    /// depth. Bumps `count` iff the full path did not exist before.
    fn insert(&mut self, id: u64, key: &TableKey) {
        let mut node = ROOT;
        let mut created = false;
        for &hash in key {
            node = match self.nodes[node].children.get(&hash).copied() {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TreeNode::new(hash));
                    self.nodes[node].children.insert(hash, child);
                    created = true;
                    child
                }
            };
        }
        self.nodes[node].ids.push(id);
        if created {
            self.count += 1;
        }
    }

    /// All ids whose first `max_level` hash components match `key`.
    ///
    /// Descends for `min(max_level, m)` levels, returning empty if a
    /// required child is absent, then sweeps the reached subtree
    /// breadth-first. Every collected id lives at full depth.
    fn lookup(&self, max_level: usize, key: &TableKey) -> Vec<u64> {
        let mut node = ROOT;
        for hash in key.iter().take(max_level) {
            match self.nodes[node].children.get(hash) {
                Some(&child) => node = child,
                None => return Vec::new(),
            }
        }

        let mut ids = Vec::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(node);
        while let Some(i) = queue.pop_front() {
            let n = &self.nodes[i];
            ids.extend_from_slice(&n.ids);
            queue.extend(n.children.values().copied());
        }
        ids
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, node: usize, level: usize) -> fmt::Result {
        let n = &self.nodes[node];
        writeln!(
            f,
            "{:indent$}({}) ids {:?}",
            "",
            n.hash,
            n.ids,
            indent = level * 4
        )?;
        for &child in n.children.values() {
            self.fmt_node(f, child, level + 1)?;
        }
        Ok(())
    }
}

/// LSH Forest index for L2 distance, after Bawa et al.
///
/// One prefix tree per hash group. Besides plain candidate queries it
/// supports adaptive-depth k-NN queries that relax the prefix match only as
/// far as needed to gather `k` candidates.
#[derive(Serialize, Deserialize)]
pub struct ForestIndex {
    family: HashFamily,
    /// `None` once the index has been torn down.
    trees: Option<Vec<PrefixTree>>,
}

impl ForestIndex {
    /// Create an LSH Forest for L2 distance.
    ///
    /// # Arguments
    /// * `dim` - Dimensionality of the data points.
    /// * `l` - Number of prefix trees.
    /// * `m` - Number of hash values per table key; also the tree depth.
    /// * `w` - Bucket width of the hash functions.
    pub fn new(dim: usize, l: usize, m: usize, w: f32) -> Result<Self> {
        Self::with_seed(dim, l, m, w, 0)
    }

    /// Like [`new`](Self::new), with reproducible randomness.
    pub fn with_seed(dim: usize, l: usize, m: usize, w: f32, seed: u64) -> Result<Self> {
        let family = HashFamily::with_seed(dim, l, m, w, seed)?;
        let trees = (0..l).map(|_| PrefixTree::new()).collect();
        Ok(ForestIndex {
            family,
            trees: Some(trees),
        })
    }

    pub fn family(&self) -> &HashFamily {
        &self.family
    }

    fn trees(&self) -> Result<&[PrefixTree]> {
        match &self.trees {
            Some(trees) => Ok(trees),
            None => Err(Error::UseAfterTeardown),
        }
    }

    /// Number of distinct full-depth paths per tree.
    pub fn tree_counts(&self) -> Result<Vec<usize>> {
        Ok(self.trees()?.iter().map(|t| t.count).collect())
    }

    /// Add a data point under a caller-assigned id.
    ///
    /// The `l` tree updates run as one parallel task per tree over
    /// disjointly owned trees and are joined before this call returns.
    pub fn insert(&mut self, point: &DataPointSlice, id: u64) -> Result<()> {
        let keys = self.family.hash(point)?;
        let trees = self.trees.as_mut().ok_or(Error::UseAfterTeardown)?;
        trees
            .par_iter_mut()
            .zip(keys)
            .for_each(|(tree, key)| tree.insert(id, &key));
        Ok(())
    }

    /// Union of the per-tree lookups at `max_level`, deduplicated across
    /// trees within this call.
    fn query_union(&self, max_level: usize, keys: &[TableKey]) -> Result<Vec<u64>> {
        let trees = self.trees()?;
        let mut seen = HashSet::default();
        let mut out = Vec::new();
        for (tree, key) in trees.iter().zip(keys) {
            for id in tree.lookup(max_level, key) {
                if seen.insert(id) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    /// Return the ids of approximate nearest neighbour candidates, unordered
    /// and deduplicated within this call.
    pub fn query(&self, point: &DataPointSlice) -> Result<Vec<u64>> {
        let keys = self.family.hash(point)?;
        self.query_union(self.family.n_projections(), &keys)
    }

    /// Return at least `min(k, distinct ids stored)` candidate ids for the
    /// top-k approximate nearest neighbours, unordered.
    ///
    /// Starts at the strictest prefix depth `m` and relaxes one level at a
    /// time, stopping as soon as the deduplicated union across all trees
    /// reaches `k` candidates. At depth 0 the whole forest content is
    /// returned. True top-k ranking is the caller's responsibility.
    pub fn query_knn(&self, point: &DataPointSlice, k: usize) -> Result<Vec<u64>> {
        self.query_knn_inner(point, k, None)
    }

    /// Like [`query_knn`](Self::query_knn); aborts with [`Error::Cancelled`]
    /// when `cancel` is raised between depth rounds.
    pub fn query_knn_cancellable(
        &self,
        point: &DataPointSlice,
        k: usize,
        cancel: &AtomicBool,
    ) -> Result<Vec<u64>> {
        self.query_knn_inner(point, k, Some(cancel))
    }

    fn query_knn_inner(
        &self,
        point: &DataPointSlice,
        k: usize,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<u64>> {
        let keys = self.family.hash(point)?;
        let mut candidates = Vec::new();
        for max_level in (0..=self.family.n_projections()).rev() {
            if let Some(token) = cancel {
                if token.load(Ordering::Relaxed) {
                    return Err(Error::Cancelled);
                }
            }
            candidates = self.query_union(max_level, &keys)?;
            if candidates.len() >= k {
                break;
            }
        }
        Ok(candidates)
    }

    /// Tear down the whole index and release its trees. Irreversible; any
    /// later call on this instance fails with [`Error::UseAfterTeardown`].
    pub fn delete(&mut self) {
        self.trees = None;
    }
}

/// Human-readable tree dump for debugging. Not a stable format.
impl fmt::Debug for ForestIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.trees {
            None => writeln!(f, "ForestIndex (torn down)"),
            Some(trees) => {
                for (i, tree) in trees.iter().enumerate() {
                    writeln!(f, "tree {} ({} full paths):", i, tree.count)?;
                    tree.fmt_node(f, ROOT, 0)?;
                }
                Ok(())
            }
        }
    }
}
