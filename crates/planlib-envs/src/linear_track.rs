//! 1D diagnostic track.

use ndarray::Array1;
use planlib::env::{ControlEnv, EnvInfo, StepResult};
use planlib::spaces::BoxSpace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// LinearTrack environment
///
/// Pays reward 1 for any positive thrust and 0 otherwise, with no state
/// coupling to the reward. A correct planner saturates at return-per-step 1
/// almost immediately, which makes this the standard smoke test for the
/// whole plan-act-store loop.
///
/// Observation: [position], drifting with the executed thrust.
/// Action: 1-dim thrust in [-1, 1].
pub struct LinearTrack {
    track_length: f32,
    max_steps: u32,

    position: f32,
    steps: u32,
    rng: StdRng,
}

impl LinearTrack {
    pub fn new() -> Self {
        Self {
            track_length: 10.0,
            max_steps: 50,
            position: 0.0,
            steps: 0,
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for LinearTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlEnv for LinearTrack {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::uniform(1, -self.track_length, self.track_length)
    }

    fn action_space(&self) -> BoxSpace {
        BoxSpace::symmetric(1)
    }

    fn reset(&mut self, seed: Option<u64>) -> (Array1<f32>, EnvInfo) {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }
        self.position = self.rng.gen_range(-1.0..1.0);
        self.steps = 0;
        (Array1::from_elem(1, self.position), EnvInfo::new())
    }

    fn step(&mut self, action: &Array1<f32>) -> StepResult {
        let thrust = action[0].clamp(-1.0, 1.0);
        self.position = (self.position + 0.1 * thrust)
            .clamp(-self.track_length, self.track_length);
        self.steps += 1;

        StepResult {
            observation: Array1::from_elem(1, self.position),
            reward: if thrust > 0.0 { 1.0 } else { 0.0 },
            terminated: false,
            truncated: self.steps >= self.max_steps,
            info: EnvInfo::new(),
        }
    }

    fn render(&self) -> Option<String> {
        Some(format!("position {:+.2}", self.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_follows_thrust_sign() {
        let mut env = LinearTrack::new();
        env.reset(Some(0));
        assert_eq!(env.step(&Array1::from_elem(1, 0.5)).reward, 1.0);
        assert_eq!(env.step(&Array1::from_elem(1, -0.5)).reward, 0.0);
        assert_eq!(env.step(&Array1::from_elem(1, 0.0)).reward, 0.0);
    }

    #[test]
    fn test_truncates_after_fifty_steps() {
        let mut env = LinearTrack::new();
        env.reset(Some(4));
        let action = Array1::from_elem(1, 1.0);
        let mut last = None;
        for _ in 0..50 {
            last = Some(env.step(&action));
        }
        assert!(last.unwrap().truncated);
    }

    #[test]
    fn test_same_seed_same_start() {
        let mut a = LinearTrack::new();
        let mut b = LinearTrack::new();
        assert_eq!(a.reset(Some(11)).0, b.reset(Some(11)).0);
    }
}
