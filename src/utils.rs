use crate::DataPoint;
use rand::distributions::Uniform;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Create a small fast RNG. A `seed` of 0 seeds the RNG from the OS.
pub fn create_rng(seed: u64) -> SmallRng {
    if seed == 0 {
        SmallRng::from_entropy()
    } else {
        SmallRng::seed_from_u64(seed)
    }
}

pub fn rand_unit_vec<R: Rng>(size: usize, rng: R) -> Vec<f32> {
    rng.sample_iter(StandardNormal).take(size).collect()
}

/// Generate `n` random points with coordinates uniform in `[0, scale)`.
///
/// In high dimensions the pairwise distances concentrate well above `scale`,
/// which makes these points suitable as a well-separated test workload.
pub fn random_points<R: Rng>(n: usize, dim: usize, scale: f32, rng: &mut R) -> Vec<DataPoint> {
    let dist = Uniform::new(0., scale);
    let mut points = Vec::with_capacity(n);
    for _ in 0..n {
        points.push((0..dim).map(|_| rng.sample(&dist)).collect());
    }
    points
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_create_rng_deterministic() {
        let a: u64 = create_rng(12).gen();
        let b: u64 = create_rng(12).gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_points_shape() {
        let mut rng = create_rng(1);
        let points = random_points(7, 5, 32., &mut rng);
        assert_eq!(points.len(), 7);
        assert!(points.iter().all(|p| p.len() == 5));
        assert!(points.iter().flatten().all(|&x| (0. ..32.).contains(&x)));
    }
}
