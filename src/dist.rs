//! Exact L2 helpers for post-processing candidates.
//!
//! The indexes only return candidate ids. Callers that need true nearest
//! neighbours rank the candidate points with the functions here.
use crate::DataPoint;
use ndarray::prelude::*;
use rayon::prelude::*;
use std::cmp::Ordering;

/// L2 norm of a single vector.
///
/// # Examples
///
/// ```
/// use lsh_ann::dist::l2_norm;
/// let norm = l2_norm(&[3., 4.]);
/// assert_eq!(norm, 5.);
/// ```
pub fn l2_norm(x: &[f32]) -> f32 {
    let x = aview1(x);
    x.dot(&x).sqrt()
}

/// L2 distance between two vectors.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
pub fn l2_dist(a: &[f32], b: &[f32]) -> f32 {
    let d = &aview1(a) - &aview1(b);
    d.dot(&d).sqrt()
}

/// Rank candidate points by exact L2 distance to the query.
///
/// Returns the candidate positions and their distances, closest first.
///
/// # Examples
///
/// ```
/// use lsh_ann::dist::sort_by_distance;
/// let candidates = vec![vec![10., 0.], vec![1., 0.], vec![5., 0.]];
/// let (order, dist) = sort_by_distance(&[0., 0.], &candidates);
/// assert_eq!(order, vec![1, 2, 0]);
/// assert_eq!(dist[0], 1.);
/// ```
pub fn sort_by_distance(q: &[f32], vs: &[DataPoint]) -> (Vec<usize>, Vec<f32>) {
    let dist: Vec<f32> = vs.par_iter().map(|v| l2_dist(q, v)).collect();
    let mut intermed: Vec<(usize, f32)> = dist.into_iter().enumerate().collect();
    intermed.sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    intermed.into_iter().unzip()
}
