//! # lsh-ann (Locality Sensitive Hashing)
//!
//! Approximate nearest neighbour candidate retrieval for Euclidean (L2)
//! distance in sub-linear time. Points are inserted under caller-assigned
//! integer ids; queries return an unordered, deduplicated set of candidate
//! ids likely to be near the query point. Exact distances and ranking are
//! deliberately left to the caller (see [`dist`] for helpers).
//!
//! For more information on the subject see:
//! * [Introduction on LSH](http://people.csail.mit.edu/gregory/annbook/introduction.pdf)
//! * [The L2 hash family used in this crate](https://www.cs.princeton.edu/courses/archive/spring05/cos598E/bib/p253-datar.pdf)
//!
//! ## Index variants
//! * [`FlatIndex`] - one hash table per hash group; the classic scheme.
//! * [`ForestIndex`] - one prefix tree per group with adaptive-depth k-NN
//!   queries (LSH Forest, Bawa et al.).
//! * [`MultiprobeIndex`] - a [`FlatIndex`] that also probes perturbed
//!   buckets to raise recall without growing `l` or `m` (Lv et al.).
//!
//! ## Getting started
//!
//! ```rust
//! use lsh_ann::FlatIndex;
//!
//! // dim 3, 10 tables, 5 hash values per key, bucket width 4.0
//! let mut index = FlatIndex::with_seed(3, 10, 5, 4.0, 1).unwrap();
//! index.insert(&[1.0, 1.5, 2.0], 0).unwrap();
//! index.insert(&[2.0, 1.1, -0.3], 1).unwrap();
//!
//! // query in sub-linear time
//! let candidates = index.query(&[1.0, 1.5, 2.0]).unwrap();
//! assert!(candidates.contains(&0));
//! ```
//!
//! ## Seed
//! Random projections generate the hash functions. By default randomness is
//! seeded from the OS; the `with_seed` constructors give reproducible
//! indexes.
//!
//! ## Concurrency
//! Inserts fan out one parallel task per hash group and join before
//! returning. Inserting takes `&mut self`, so the single-writer discipline
//! the algorithm requires is enforced by the borrow checker; queries take
//! `&self` and may run concurrently with each other.
//!
//! ## BLAS support
//! Utilizing [BLAS](https://en.wikipedia.org/wiki/Basic_Linear_Algebra_Subprograms)
//! will heavily increase performance. Install `lsh-ann` w/ the `"blas"`
//! feature and reinstall `ndarray` w/ `"blas"` support.
#[cfg(feature = "blas")]
extern crate blas_src;

mod error;
mod hash;
mod index {
    pub mod flat;
    pub mod forest;
    pub mod multi_probe;
    mod test;
}
pub mod dist;
pub mod prelude;
#[cfg(feature = "stats")]
pub mod stats;
pub mod utils;

pub use crate::error::{Error, Result};
pub use crate::hash::{HashFamily, HashPrimitive, TableKey};
pub use crate::index::flat::{Bucket, FlatIndex};
pub use crate::index::forest::ForestIndex;
pub use crate::index::multi_probe::MultiprobeIndex;

/// An owned data point.
pub type DataPoint = Vec<f32>;
/// A borrowed data point.
pub type DataPointSlice = [f32];
