use crate::utils::create_rng;
use crate::{DataPointSlice, Error, Result};
use ndarray::prelude::*;
use ndarray_rand::rand_distr::{StandardNormal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A single quantized projection value.
pub type HashPrimitive = i32;
/// Concatenation of `m` hash values. Identifies one bucket within one table.
pub type TableKey = Vec<HashPrimitive>;

/// One group of `m` L2 hash functions.
///
/// See the hash function in
/// https://www.cs.princeton.edu/courses/archive/spring05/cos598E/bib/p253-datar.pdf
/// paragraph 3.2:
///
/// h(v) = floor((a^T v + b) / w)
#[derive(Serialize, Deserialize, Clone)]
pub struct L2Hasher {
    a: Array2<f32>,
    b: Array1<f32>,
    w: f32,
}

impl L2Hasher {
    fn new(dim: usize, m: usize, w: f32, seed: u64) -> Self {
        let mut rng = create_rng(seed);
        let a = Array::random_using((m, dim), StandardNormal, &mut rng);
        let b = Array::random_using(m, Uniform::new(0., w), &mut rng);
        L2Hasher { a, b, w }
    }

    /// Project and quantize `v`. The caller has already validated the length.
    fn table_key(&self, v: &DataPointSlice) -> TableKey {
        ((self.a.dot(&aview1(v)) + &self.b) / self.w)
            .mapv(|x| x.floor() as HashPrimitive)
            .to_vec()
    }
}

/// The shared family of LSH functions all index variants hash with.
///
/// Holds `l` independent groups of `m` L2 hash functions. The projection
/// vectors and offsets are drawn once at construction and are immutable
/// afterwards, so hashing the same point always yields the same keys.
#[derive(Serialize, Deserialize, Clone)]
pub struct HashFamily {
    /// Dimensionality of the data points.
    dim: usize,
    /// Number of hash tables. `L` in literature.
    l: usize,
    /// Number of hash values concatenated per table key. `K` in literature.
    m: usize,
    /// Bucket width of the L2 hash functions. `r` in literature.
    w: f32,
    hashers: Vec<L2Hasher>,
}

impl HashFamily {
    /// Create a family with OS-seeded randomness.
    pub fn new(dim: usize, l: usize, m: usize, w: f32) -> Result<Self> {
        Self::with_seed(dim, l, m, w, 0)
    }

    /// Create a family with reproducible randomness.
    ///
    /// # Arguments
    /// * `dim` - Dimensionality of the data points.
    /// * `l` - Number of independent hash groups.
    /// * `m` - Number of hash values concatenated per table key.
    /// * `w` - Bucket width of the hash functions.
    /// * `seed` - Seed for the RNG's. If 0, RNG's are seeded from the OS.
    pub fn with_seed(dim: usize, l: usize, m: usize, w: f32, seed: u64) -> Result<Self> {
        if dim == 0 || l == 0 || m == 0 || !(w > 0.) || !w.is_finite() {
            return Err(Error::InvalidConfig);
        }
        let mut rng = create_rng(seed);
        let hashers = (0..l).map(|_| L2Hasher::new(dim, m, w, rng.gen())).collect();
        Ok(HashFamily {
            dim,
            l,
            m,
            w,
            hashers,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn n_tables(&self) -> usize {
        self.l
    }

    pub fn n_projections(&self) -> usize {
        self.m
    }

    pub fn bucket_width(&self) -> f32 {
        self.w
    }

    pub(crate) fn validate(&self, v: &DataPointSlice) -> Result<()> {
        if v.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                got: v.len(),
            });
        }
        Ok(())
    }

    /// Hash `v` with every group, yielding one table key per table.
    pub fn hash(&self, v: &DataPointSlice) -> Result<Vec<TableKey>> {
        self.validate(v)?;
        Ok(self.hashers.iter().map(|h| h.table_key(v)).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_invalid_config() {
        assert!(HashFamily::new(0, 5, 5, 4.).is_err());
        assert!(HashFamily::new(10, 0, 5, 4.).is_err());
        assert!(HashFamily::new(10, 5, 0, 4.).is_err());
        assert!(HashFamily::new(10, 5, 5, 0.).is_err());
        assert!(HashFamily::new(10, 5, 5, -1.).is_err());
        assert!(HashFamily::new(10, 5, 5, std::f32::NAN).is_err());
        assert!(HashFamily::new(10, 5, 5, 4.).is_ok());
    }

    #[test]
    fn test_dimension_mismatch() {
        let family = HashFamily::with_seed(3, 2, 4, 2.2, 1).unwrap();
        match family.hash(&[1., 2.]) {
            Err(Error::DimensionMismatch { expected, got }) => {
                assert_eq!(expected, 3);
                assert_eq!(got, 2);
            }
            _ => panic!("expected dimension mismatch"),
        }
    }

    #[test]
    fn test_key_shape() {
        let family = HashFamily::with_seed(5, 3, 7, 2.2, 1).unwrap();
        let keys = family.hash(&[1., 2., 3., 1., 3.]).unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| k.len() == 7));
    }

    #[test]
    fn test_deterministic() {
        let a = HashFamily::with_seed(5, 3, 7, 2.2, 42).unwrap();
        let b = HashFamily::with_seed(5, 3, 7, 2.2, 42).unwrap();
        let v = &[1., 2., 3., 1., 3.];
        assert_eq!(a.hash(v).unwrap(), b.hash(v).unwrap());
    }

    #[test]
    fn test_locality() {
        let family = HashFamily::with_seed(5, 1, 3, 4., 1).unwrap();
        // two very close vectors
        let h1 = family.hash(&[1., 2., 3., 1., 3.]).unwrap();
        let h2 = family.hash(&[1.0001, 2., 3., 1., 3.0001]).unwrap();
        // a distant one
        let h3 = family.hash(&[1000., 1000., 1000., 1000., 1000.]).unwrap();
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }
}
