//! Continuous (box) observation/action spaces.

use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Bounded continuous space over flat vectors.
#[derive(Clone, Debug)]
pub struct BoxSpace {
    /// Lower bound for each element
    pub low: Array1<f32>,
    /// Upper bound for each element
    pub high: Array1<f32>,
}

impl BoxSpace {
    /// Create a new box space with given bounds
    pub fn new(low: Array1<f32>, high: Array1<f32>) -> Self {
        assert_eq!(low.len(), high.len(), "low and high must have same length");
        Self { low, high }
    }

    /// Create a box space with uniform bounds
    pub fn uniform(dim: usize, low: f32, high: f32) -> Self {
        Self::new(Array1::from_elem(dim, low), Array1::from_elem(dim, high))
    }

    /// Create a box space from -inf to +inf (unbounded)
    pub fn unbounded(dim: usize) -> Self {
        Self::uniform(dim, f32::NEG_INFINITY, f32::INFINITY)
    }

    /// Create a symmetric box [-1, 1] for all elements
    pub fn symmetric(dim: usize) -> Self {
        Self::uniform(dim, -1.0, 1.0)
    }

    pub fn dim(&self) -> usize {
        self.low.len()
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Array1<f32> {
        let mut out = Array1::zeros(self.dim());
        for ((v, &l), &h) in out.iter_mut().zip(self.low.iter()).zip(self.high.iter()) {
            *v = Uniform::new(l, h).sample(rng);
        }
        out
    }

    pub fn contains(&self, value: &Array1<f32>) -> bool {
        value.len() == self.dim()
            && value
                .iter()
                .zip(self.low.iter())
                .zip(self.high.iter())
                .all(|((&v, &l), &h)| v >= l && v <= h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_within_bounds() {
        let space = BoxSpace::uniform(4, -2.0, 3.0);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let s = space.sample(&mut rng);
            assert!(space.contains(&s));
        }
    }

    #[test]
    fn test_contains_rejects_out_of_bounds() {
        let space = BoxSpace::symmetric(2);
        assert!(space.contains(&Array1::from_vec(vec![0.5, -0.5])));
        assert!(!space.contains(&Array1::from_vec(vec![1.5, 0.0])));
        assert!(!space.contains(&Array1::from_vec(vec![0.0])));
    }

}
