//! Numeric kernels shared by the world model and the planner.
//!
//! Value and reward heads predict distributions over `num_bins` bins spanning
//! `[symlog_min, symlog_max]` in symlog space; `two_hot_inv` decodes them back
//! to scalars. Latents are simplicially normalized (`simnorm`) in fixed-size
//! groups.

use ndarray::Array1;

/// Lower bound of the squashed policy log-std.
pub const MIN_LOG_STD: f32 = -5.0;
/// Upper bound of the squashed policy log-std.
pub const MAX_LOG_STD: f32 = 1.0;

/// Signed logarithm: `sign(x) * ln(1 + |x|)`.
pub fn symlog(x: f32) -> f32 {
    if x == 0.0 {
        0.0
    } else {
        x.signum() * (1.0 + x.abs()).ln()
    }
}

/// Inverse of [`symlog`]: `sign(x) * (exp(|x|) - 1)`.
pub fn symexp(x: f32) -> f32 {
    if x == 0.0 {
        0.0
    } else {
        x.signum() * (x.abs().exp() - 1.0)
    }
}

/// Numerically stable softplus.
pub fn softplus(x: f32) -> f32 {
    if x > 20.0 {
        x
    } else {
        (1.0 + x.exp()).ln()
    }
}

/// Mish activation: `x * tanh(softplus(x))`.
pub fn mish(x: f32) -> f32 {
    x * softplus(x).tanh()
}

/// Stable in-place softmax (max-subtracted).
///
/// `-inf` entries come out as exactly zero weight, which the planner relies
/// on when discarded rollouts land in the elite slice.
pub fn softmax_in_place(xs: &mut [f32]) {
    let max = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in xs.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in xs.iter_mut() {
            *v /= sum;
        }
    }
}

/// Decode a two-hot distribution to a scalar.
///
/// Softmax over `logits`, expectation against evenly spaced bin centers in
/// `[lo, hi]` (symlog space), then `symexp` back to the raw scale.
pub fn two_hot_inv(logits: &[f32], lo: f32, hi: f32) -> f32 {
    debug_assert!(logits.len() >= 2);
    let mut probs = logits.to_vec();
    softmax_in_place(&mut probs);
    let step = (hi - lo) / (logits.len() - 1) as f32;
    let mut acc = 0.0;
    for (i, p) in probs.iter().enumerate() {
        acc += p * (lo + step * i as f32);
    }
    symexp(acc)
}

/// Simplicial normalization: softmax over consecutive `group`-sized chunks.
///
/// The latent dimension must be a multiple of `group` (enforced by config
/// validation before any model is built).
pub fn simnorm_in_place(z: &mut Array1<f32>, group: usize) {
    debug_assert!(z.len() % group == 0);
    let data = z.as_slice_mut().expect("latent is contiguous");
    for chunk in data.chunks_mut(group) {
        softmax_in_place(chunk);
    }
}

/// Squash a raw log-std output into `[MIN_LOG_STD, MAX_LOG_STD]`.
pub fn squash_log_std(raw: f32) -> f32 {
    MIN_LOG_STD + (MAX_LOG_STD - MIN_LOG_STD) * 0.5 * (raw.tanh() + 1.0)
}
