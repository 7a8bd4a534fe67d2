//! Serial (sequential) vectorization backend.
//!
//! Runs environments one at a time on the calling thread. The default for
//! small-scale experiments and the building block the async backend wraps.

use ndarray::{Array1, Array2};

use crate::env::{ControlEnv, EnvInfo};
use crate::spaces::BoxSpace;
use crate::vector::{VecEnvBackend, VecEnvResult};

pub struct Serial<E: ControlEnv> {
    envs: Vec<E>,
    obs_dim: usize,
    // Per-env episode accumulators; envs themselves stay stateless about stats.
    episode_returns: Vec<f32>,
    episode_lengths: Vec<u32>,
}

impl<E: ControlEnv> Serial<E> {
    /// Create `num_envs` instances from a factory.
    pub fn new<F>(env_creator: F, num_envs: usize) -> Self
    where
        F: Fn() -> E,
    {
        let first_env = env_creator();
        let obs_dim = first_env.observation_space().dim();

        let mut envs = Vec::with_capacity(num_envs);
        envs.push(first_env);
        for _ in 1..num_envs {
            envs.push(env_creator());
        }

        Self {
            envs,
            obs_dim,
            episode_returns: vec![0.0; num_envs],
            episode_lengths: vec![0; num_envs],
        }
    }
}

impl<E: ControlEnv> VecEnvBackend for Serial<E> {
    fn observation_space(&self) -> BoxSpace {
        self.envs[0].observation_space()
    }

    fn action_space(&self) -> BoxSpace {
        self.envs[0].action_space()
    }

    fn num_envs(&self) -> usize {
        self.envs.len()
    }

    fn reset(&mut self, seed: Option<u64>) -> (Array2<f32>, Vec<EnvInfo>) {
        let num_envs = self.envs.len();
        let mut observations = Array2::zeros((num_envs, self.obs_dim));
        let mut infos = Vec::with_capacity(num_envs);

        for (i, env) in self.envs.iter_mut().enumerate() {
            let env_seed = seed.map(|s| s.wrapping_add(i as u64));
            let (obs, info) = env.reset(env_seed);
            observations.row_mut(i).assign(&obs);
            infos.push(info);
            self.episode_returns[i] = 0.0;
            self.episode_lengths[i] = 0;
        }

        (observations, infos)
    }

    fn step(&mut self, actions: &Array2<f32>) -> VecEnvResult {
        let num_envs = self.envs.len();
        assert_eq!(actions.nrows(), num_envs, "one action row per environment");

        let mut observations = Array2::zeros((num_envs, self.obs_dim));
        let mut rewards = Vec::with_capacity(num_envs);
        let mut terminated = Vec::with_capacity(num_envs);
        let mut truncated = Vec::with_capacity(num_envs);
        let mut infos = Vec::with_capacity(num_envs);

        for (i, env) in self.envs.iter_mut().enumerate() {
            let action: Array1<f32> = actions.row(i).to_owned();
            let result = env.step(&action);

            self.episode_returns[i] += result.reward;
            self.episode_lengths[i] += 1;

            rewards.push(result.reward);
            terminated.push(result.terminated);
            truncated.push(result.truncated);

            if result.terminated || result.truncated {
                let info = result.info.with_episode_stats(
                    self.episode_returns[i],
                    self.episode_lengths[i],
                );
                infos.push(info);
                self.episode_returns[i] = 0.0;
                self.episode_lengths[i] = 0;
                // Auto-reset: the returned row is the next episode's start.
                let (obs, _) = env.reset(None);
                observations.row_mut(i).assign(&obs);
            } else {
                infos.push(result.info);
                observations.row_mut(i).assign(&result.observation);
            }
        }

        VecEnvResult {
            observations,
            rewards,
            terminated,
            truncated,
            infos,
        }
    }

    fn close(&mut self) {
        for env in &mut self.envs {
            env.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StepResult;

    /// Counts up and terminates after three steps; observation is the count.
    struct CountEnv {
        count: u32,
    }

    impl ControlEnv for CountEnv {
        fn observation_space(&self) -> BoxSpace {
            BoxSpace::unbounded(1)
        }

        fn action_space(&self) -> BoxSpace {
            BoxSpace::symmetric(1)
        }

        fn reset(&mut self, _seed: Option<u64>) -> (Array1<f32>, EnvInfo) {
            self.count = 0;
            (Array1::zeros(1), EnvInfo::new())
        }

        fn step(&mut self, _action: &Array1<f32>) -> StepResult {
            self.count += 1;
            StepResult {
                observation: Array1::from_elem(1, self.count as f32),
                reward: 1.0,
                terminated: self.count >= 3,
                truncated: false,
                info: EnvInfo::new(),
            }
        }
    }

    #[test]
    fn test_step_batches_all_envs() {
        let mut vec_env = Serial::new(|| CountEnv { count: 0 }, 2);
        let (obs, infos) = vec_env.reset(Some(0));
        assert_eq!(obs.dim(), (2, 1));
        assert_eq!(infos.len(), 2);

        let result = vec_env.step(&Array2::zeros((2, 1)));
        assert_eq!(result.rewards, vec![1.0, 1.0]);
        assert_eq!(result.dones(), vec![false, false]);
        assert_eq!(result.observations[[0, 0]], 1.0);
    }

    #[test]
    fn test_auto_reset_attaches_episode_stats() {
        let mut vec_env = Serial::new(|| CountEnv { count: 0 }, 1);
        vec_env.reset(Some(0));
        let actions = Array2::zeros((1, 1));
        vec_env.step(&actions);
        vec_env.step(&actions);
        let result = vec_env.step(&actions);

        assert_eq!(result.terminated, vec![true]);
        assert_eq!(result.infos[0].episode_return, Some(3.0));
        assert_eq!(result.infos[0].episode_length, Some(3.0));
        // Row already holds the fresh episode's first observation.
        assert_eq!(result.observations[[0, 0]], 0.0);

        // Counters restart with the new episode.
        let result = vec_env.step(&actions);
        assert_eq!(result.terminated, vec![false]);
        assert!(result.infos[0].episode_return.is_none());
    }
}
