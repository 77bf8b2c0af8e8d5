//! Collision-probability estimates for picking `l`, `m` and `w`.
#![cfg(feature = "stats")]
use statrs::{
    consts::SQRT_2PI,
    distribution::{Normal, Univariate},
};

/// Collision probability of one L2 hash value for two points at distance
/// `c` (in units of the normalization radius R).
///
/// Compute 𝑃1 if c = 1, 𝑃2 if c = cR.
///
/// # Arguments
/// * `w` - Bucket width of the L2 hash functions.
/// * `c` - Approximation factor, cR.
pub fn l2_ph(w: f64, c: f64) -> f64 {
    let norm = Normal::new(0., 1.).unwrap();
    1. - 2. * norm.cdf(-w / c)
        - 2. / (SQRT_2PI * w / c) * (1. - (-(w.powf(2.) / (2. * c.powf(2.)))).exp())
}

/// Number of hash tables needed to return the true nearest neighbour with
/// probability 1 - δ.
///
/// # Arguments
/// * `delta` - Acceptable probability of missing the nearest neighbour.
/// * `p1` - 𝑃1 in literature, see [`l2_ph`].
/// * `m` - Number of hash values concatenated per table key.
pub fn estimate_l(delta: f64, p1: f64, m: usize) -> usize {
    (delta.ln() / (1. - p1.powf(m as f64)).ln()).round() as usize
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_l2_ph() {
        // tested w/ numpy
        assert_eq!(0.609548422215397, l2_ph(2.0, 1.0) as f32);
    }

    #[test]
    fn test_estimate_l() {
        assert_eq!(20, estimate_l(0.2, 0.6, 5));
    }
}
