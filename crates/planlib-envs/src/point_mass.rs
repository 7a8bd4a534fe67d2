//! 2D point-mass reach task.

use ndarray::Array1;
use planlib::env::{ControlEnv, EnvInfo, StepResult};
use planlib::spaces::BoxSpace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// PointMass environment
///
/// A damped point mass on the plane accelerates toward a goal at the
/// origin. Reaching the goal region terminates the episode, which makes
/// this the simplest bundled task with true terminal states.
///
/// Observation: [x, y, vx, vy]
/// Action: 2-dim acceleration in [-1, 1], scaled by `accel_scale`
pub struct PointMass {
    dt: f32,
    damping: f32,
    accel_scale: f32,
    goal_radius: f32,
    bound: f32,
    max_steps: u32,

    position: [f32; 2],
    velocity: [f32; 2],
    steps: u32,
    rng: StdRng,
}

impl PointMass {
    pub fn new() -> Self {
        Self {
            dt: 0.1,
            damping: 0.9,
            accel_scale: 1.0,
            goal_radius: 0.05,
            bound: 2.0,
            max_steps: 300,
            position: [0.0; 2],
            velocity: [0.0; 2],
            steps: 0,
            rng: StdRng::from_entropy(),
        }
    }

    fn observation(&self) -> Array1<f32> {
        Array1::from_vec(vec![
            self.position[0],
            self.position[1],
            self.velocity[0],
            self.velocity[1],
        ])
    }

    fn distance_to_goal(&self) -> f32 {
        (self.position[0].powi(2) + self.position[1].powi(2)).sqrt()
    }
}

impl Default for PointMass {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlEnv for PointMass {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::new(
            Array1::from_vec(vec![-self.bound, -self.bound, -4.0, -4.0]),
            Array1::from_vec(vec![self.bound, self.bound, 4.0, 4.0]),
        )
    }

    fn action_space(&self) -> BoxSpace {
        BoxSpace::symmetric(2)
    }

    fn reset(&mut self, seed: Option<u64>) -> (Array1<f32>, EnvInfo) {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }
        // Spawn away from the goal so episodes are never trivially done.
        loop {
            self.position = [self.rng.gen_range(-1.0..1.0), self.rng.gen_range(-1.0..1.0)];
            if self.distance_to_goal() > 0.2 {
                break;
            }
        }
        self.velocity = [0.0; 2];
        self.steps = 0;
        (self.observation(), EnvInfo::new())
    }

    fn step(&mut self, action: &Array1<f32>) -> StepResult {
        let ax = action[0].clamp(-1.0, 1.0) * self.accel_scale;
        let ay = action[1].clamp(-1.0, 1.0) * self.accel_scale;

        self.velocity[0] = (self.velocity[0] + ax * self.dt) * self.damping;
        self.velocity[1] = (self.velocity[1] + ay * self.dt) * self.damping;
        self.velocity[0] = self.velocity[0].clamp(-4.0, 4.0);
        self.velocity[1] = self.velocity[1].clamp(-4.0, 4.0);
        self.position[0] = (self.position[0] + self.velocity[0] * self.dt)
            .clamp(-self.bound, self.bound);
        self.position[1] = (self.position[1] + self.velocity[1] * self.dt)
            .clamp(-self.bound, self.bound);
        self.steps += 1;

        let distance = self.distance_to_goal();
        let effort = ax * ax + ay * ay;
        let terminated = distance <= self.goal_radius;
        let reward = if terminated {
            10.0
        } else {
            -distance - 0.01 * effort
        };

        StepResult {
            observation: self.observation(),
            reward,
            terminated,
            truncated: !terminated && self.steps >= self.max_steps,
            info: EnvInfo::new(),
        }
    }

    fn render(&self) -> Option<String> {
        Some(format!(
            "pos ({:+.2}, {:+.2}), dist {:.3}",
            self.position[0],
            self.position[1],
            self.distance_to_goal()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_spawns_off_goal() {
        let mut env = PointMass::new();
        for seed in 0..20 {
            env.reset(Some(seed));
            assert!(env.distance_to_goal() > 0.2);
        }
    }

    #[test]
    fn test_reaching_goal_terminates_with_bonus() {
        let mut env = PointMass::new();
        env.reset(Some(3));
        env.position = [0.04, 0.0];
        env.velocity = [0.0, 0.0];
        let result = env.step(&Array1::zeros(2));
        assert!(result.terminated);
        assert_eq!(result.reward, 10.0);
    }

    #[test]
    fn test_moving_toward_goal_beats_moving_away() {
        let mut env = PointMass::new();
        env.reset(Some(5));
        env.position = [1.0, 0.0];
        env.velocity = [0.0, 0.0];
        let toward = env.step(&Array1::from_vec(vec![-1.0, 0.0])).reward;

        env.reset(Some(5));
        env.position = [1.0, 0.0];
        env.velocity = [0.0, 0.0];
        let away = env.step(&Array1::from_vec(vec![1.0, 0.0])).reward;
        assert!(toward > away);
    }

    #[test]
    fn test_state_stays_bounded() {
        let mut env = PointMass::new();
        env.reset(Some(9));
        let push = Array1::from_vec(vec![1.0, 1.0]);
        for _ in 0..400 {
            let result = env.step(&push);
            assert!(env.observation_space().contains(&result.observation));
            if result.done() {
                break;
            }
        }
    }
}
