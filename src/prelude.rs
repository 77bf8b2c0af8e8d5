//! Re-export of the public api of lsh-ann.
pub use crate::{
    dist::{l2_dist, l2_norm, sort_by_distance},
    error::{Error, Result},
    hash::{HashFamily, HashPrimitive, TableKey},
    index::flat::{Bucket, FlatIndex},
    index::forest::ForestIndex,
    index::multi_probe::MultiprobeIndex,
};
