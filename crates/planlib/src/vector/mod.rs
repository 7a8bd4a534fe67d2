//! Vectorized environment execution.
//!
//! Backends drive `num_envs` environment instances behind a batched
//! step/reset interface. [`Serial`] runs them inline; [`AsyncVecEnv`] moves
//! any backend onto a worker thread so planning and stepping can overlap.

mod async_vec;
mod serial;

pub use async_vec::AsyncVecEnv;
pub use serial::Serial;

use ndarray::Array2;

use crate::env::EnvInfo;
use crate::spaces::BoxSpace;

/// Result from stepping all environments.
///
/// Rows of `observations` line up with `rewards`, `terminated`, `truncated`
/// and `infos` by environment index. A done environment is reset in place
/// and its row already holds the next episode's first observation.
#[derive(Clone, Debug)]
pub struct VecEnvResult {
    pub observations: Array2<f32>,
    pub rewards: Vec<f32>,
    pub terminated: Vec<bool>,
    pub truncated: Vec<bool>,
    pub infos: Vec<EnvInfo>,
}

impl VecEnvResult {
    /// Per-environment done flags.
    pub fn dones(&self) -> Vec<bool> {
        self.terminated
            .iter()
            .zip(&self.truncated)
            .map(|(&t, &tr)| t || tr)
            .collect()
    }
}

/// Batched environment backend.
pub trait VecEnvBackend: Send {
    fn observation_space(&self) -> BoxSpace;

    fn action_space(&self) -> BoxSpace;

    fn num_envs(&self) -> usize;

    /// Reset all environments. Per-environment seeds derive from `seed` so
    /// instances do not march in lockstep.
    fn reset(&mut self, seed: Option<u64>) -> (Array2<f32>, Vec<EnvInfo>);

    /// Step all environments with one action row each.
    fn step(&mut self, actions: &Array2<f32>) -> VecEnvResult;

    fn close(&mut self) {}
}

impl VecEnvBackend for Box<dyn VecEnvBackend> {
    fn observation_space(&self) -> BoxSpace {
        (**self).observation_space()
    }

    fn action_space(&self) -> BoxSpace {
        (**self).action_space()
    }

    fn num_envs(&self) -> usize {
        (**self).num_envs()
    }

    fn reset(&mut self, seed: Option<u64>) -> (Array2<f32>, Vec<EnvInfo>) {
        (**self).reset(seed)
    }

    fn step(&mut self, actions: &Array2<f32>) -> VecEnvResult {
        (**self).step(actions)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
