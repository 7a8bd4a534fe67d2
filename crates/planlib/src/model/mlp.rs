//! Small inference-only MLP building blocks over `ndarray`.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::math::mish;

const LAYER_NORM_EPS: f32 = 1e-6;

/// Plain affine layer.
#[derive(Clone, Debug)]
pub struct Dense {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Dense {
    /// Fan-in scaled normal initialization.
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut StdRng) -> Self {
        let std = (1.0 / in_dim as f32).sqrt();
        let dist = Normal::new(0.0, std).unwrap();
        let weight = Array2::from_shape_fn((out_dim, in_dim), |_| dist.sample(rng));
        Self {
            weight,
            bias: Array1::zeros(out_dim),
        }
    }

    /// All-zero weights and bias. Used for distribution heads so a fresh
    /// model predicts the midpoint of the bin range everywhere.
    pub fn zeros(in_dim: usize, out_dim: usize) -> Self {
        Self {
            weight: Array2::zeros((out_dim, in_dim)),
            bias: Array1::zeros(out_dim),
        }
    }

    pub fn forward(&self, x: &Array1<f32>) -> Array1<f32> {
        self.weight.dot(x) + &self.bias
    }

    pub fn out_dim(&self) -> usize {
        self.bias.len()
    }
}

/// Affine layer followed by layer normalization and (optionally) mish.
#[derive(Clone, Debug)]
pub struct NormedLinear {
    linear: Dense,
    gamma: Array1<f32>,
    beta: Array1<f32>,
    mish: bool,
}

impl NormedLinear {
    pub fn new(in_dim: usize, out_dim: usize, mish: bool, rng: &mut StdRng) -> Self {
        Self {
            linear: Dense::new(in_dim, out_dim, rng),
            gamma: Array1::ones(out_dim),
            beta: Array1::zeros(out_dim),
            mish,
        }
    }

    pub fn forward(&self, x: &Array1<f32>) -> Array1<f32> {
        let mut y = self.linear.forward(x);
        layer_norm_in_place(&mut y, &self.gamma, &self.beta);
        if self.mish {
            y.mapv_inplace(mish);
        }
        y
    }
}

fn layer_norm_in_place(x: &mut Array1<f32>, gamma: &Array1<f32>, beta: &Array1<f32>) {
    let n = x.len() as f32;
    let mean = x.sum() / n;
    let var = x.mapv(|v| (v - mean).powi(2)).sum() / n;
    let inv = 1.0 / (var + LAYER_NORM_EPS).sqrt();
    for (i, v) in x.iter_mut().enumerate() {
        *v = (*v - mean) * inv * gamma[i] + beta[i];
    }
}

/// Concatenate latent and action into a single input vector.
pub(crate) fn concat(a: &Array1<f32>, b: &Array1<f32>) -> Array1<f32> {
    let mut out = Array1::zeros(a.len() + b.len());
    out.slice_mut(ndarray::s![..a.len()]).assign(a);
    out.slice_mut(ndarray::s![a.len()..]).assign(b);
    out
}

/// Jitter weights in place. Supports tests and demo update hooks that need
/// a model observably different from its predecessor.
pub(crate) fn perturb_dense(layer: &mut Dense, scale: f32, rng: &mut StdRng) {
    for w in layer.weight.iter_mut() {
        *w += rng.gen_range(-scale..scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_dense_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Dense::new(4, 7, &mut rng);
        let y = layer.forward(&Array1::ones(4));
        assert_eq!(y.len(), 7);
        assert_eq!(layer.out_dim(), 7);
    }

    #[test]
    fn test_zero_dense_outputs_zero() {
        let layer = Dense::zeros(5, 3);
        let y = layer.forward(&Array1::from_vec(vec![1.0, -2.0, 3.0, 0.5, 9.0]));
        assert!(y.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_layer_norm_zero_mean_unit_var() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = NormedLinear::new(6, 8, false, &mut rng);
        let y = layer.forward(&Array1::linspace(-1.0, 1.0, 6));
        let mean = y.sum() / y.len() as f32;
        let var = y.mapv(|v| (v - mean).powi(2)).sum() / y.len() as f32;
        assert!(mean.abs() < 1e-4);
        assert!((var - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = Dense::new(3, 3, &mut StdRng::seed_from_u64(11));
        let b = Dense::new(3, 3, &mut StdRng::seed_from_u64(11));
        let x = Array1::from_vec(vec![0.1, 0.2, 0.3]);
        assert_eq!(a.forward(&x), b.forward(&x));
    }

    #[test]
    fn test_concat_order() {
        let a = Array1::from_vec(vec![1.0, 2.0]);
        let b = Array1::from_vec(vec![3.0]);
        let c = concat(&a, &b);
        assert_eq!(c.to_vec(), vec![1.0, 2.0, 3.0]);
    }
}
