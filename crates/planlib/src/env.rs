//! Environment trait for continuous-control tasks.

use ndarray::Array1;

use crate::spaces::BoxSpace;

/// Information returned from environment steps
#[derive(Clone, Debug, Default)]
pub struct EnvInfo {
    /// Episode return (if done)
    pub episode_return: Option<f32>,
    /// Episode length (if done)
    pub episode_length: Option<f32>,
    /// Custom metrics (kept minimal for performance)
    pub extra: smallvec::SmallVec<[(&'static str, f32); 4]>,
}

impl EnvInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add episode stats
    pub fn with_episode_stats(mut self, ret: f32, len: u32) -> Self {
        self.episode_return = Some(ret);
        self.episode_length = Some(len as f32);
        self
    }

    /// Add a custom metric (use rarely)
    pub fn with_extra(mut self, key: &'static str, value: f32) -> Self {
        self.extra.push((key, value));
        self
    }

    /// Get a value by key (including defaults)
    pub fn get(&self, key: &str) -> Option<f32> {
        match key {
            "episode_return" => self.episode_return,
            "episode_length" => self.episode_length,
            _ => self.extra.iter().find(|(k, _)| k == &key).map(|(_, v)| *v),
        }
    }
}

/// Result from a single environment step
#[derive(Clone, Debug)]
pub struct StepResult {
    /// Observation after the step
    pub observation: Array1<f32>,
    /// Reward received
    pub reward: f32,
    /// Whether episode terminated (goal reached, failure, etc.)
    pub terminated: bool,
    /// Whether episode truncated (time limit, etc.)
    pub truncated: bool,
    /// Additional info
    pub info: EnvInfo,
}

impl StepResult {
    /// Check if episode is done (terminated or truncated)
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A single continuous-control environment instance.
///
/// Observations and actions are flat `f32` vectors; actions are expected in
/// the environment's action space, which for every bundled task is the
/// symmetric box `[-1, 1]^d`.
pub trait ControlEnv: Send {
    /// Get the observation space
    fn observation_space(&self) -> BoxSpace;

    /// Get the action space
    fn action_space(&self) -> BoxSpace;

    /// Reset the environment to an initial state.
    fn reset(&mut self, seed: Option<u64>) -> (Array1<f32>, EnvInfo);

    /// Take a single step in the environment.
    fn step(&mut self, action: &Array1<f32>) -> StepResult;

    /// Optional: render a one-line state summary.
    fn render(&self) -> Option<String> {
        None
    }

    /// Optional: close the environment and free resources.
    fn close(&mut self) {}
}

impl ControlEnv for Box<dyn ControlEnv> {
    fn observation_space(&self) -> BoxSpace {
        (**self).observation_space()
    }

    fn action_space(&self) -> BoxSpace {
        (**self).action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (Array1<f32>, EnvInfo) {
        (**self).reset(seed)
    }

    fn step(&mut self, action: &Array1<f32>) -> StepResult {
        (**self).step(action)
    }

    fn render(&self) -> Option<String> {
        (**self).render()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_info_get() {
        let info = EnvInfo::new()
            .with_episode_stats(12.5, 200)
            .with_extra("fuel", 0.3);
        assert_eq!(info.get("episode_return"), Some(12.5));
        assert_eq!(info.get("episode_length"), Some(200.0));
        assert_eq!(info.get("fuel"), Some(0.3));
        assert_eq!(info.get("missing"), None);
    }

    #[test]
    fn test_step_result_done() {
        let result = StepResult {
            observation: Array1::zeros(1),
            reward: 0.0,
            terminated: false,
            truncated: true,
            info: EnvInfo::new(),
        };
        assert!(result.done());
    }
}
