//! Torque-limited pendulum swing-up.

use std::f32::consts::PI;

use ndarray::Array1;
use planlib::env::{ControlEnv, EnvInfo, StepResult};
use planlib::spaces::BoxSpace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Pendulum environment
///
/// A bar pivots around one end; the agent applies bounded torque at the
/// pivot and must swing the bar upright and hold it there.
///
/// Observation: [cos(theta), sin(theta), theta_dot]
/// Action: 1-dim torque in [-1, 1], scaled by `max_torque`
///
/// Cost-shaped reward, always non-positive, maximal at the upright rest
/// state. Episodes never terminate; they truncate at `max_steps`.
pub struct Pendulum {
    gravity: f32,
    mass: f32,
    length: f32,
    dt: f32,
    max_torque: f32,
    max_speed: f32,
    max_steps: u32,

    theta: f32,
    theta_dot: f32,
    steps: u32,
    rng: StdRng,
}

impl Pendulum {
    pub fn new() -> Self {
        Self {
            gravity: 10.0,
            mass: 1.0,
            length: 1.0,
            dt: 0.05,
            max_torque: 2.0,
            max_speed: 8.0,
            max_steps: 200,
            theta: 0.0,
            theta_dot: 0.0,
            steps: 0,
            rng: StdRng::from_entropy(),
        }
    }

    fn observation(&self) -> Array1<f32> {
        Array1::from_vec(vec![self.theta.cos(), self.theta.sin(), self.theta_dot])
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap an angle into [-pi, pi].
fn angle_normalize(theta: f32) -> f32 {
    (theta + PI).rem_euclid(2.0 * PI) - PI
}

impl ControlEnv for Pendulum {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::new(
            Array1::from_vec(vec![-1.0, -1.0, -self.max_speed]),
            Array1::from_vec(vec![1.0, 1.0, self.max_speed]),
        )
    }

    fn action_space(&self) -> BoxSpace {
        BoxSpace::symmetric(1)
    }

    fn reset(&mut self, seed: Option<u64>) -> (Array1<f32>, EnvInfo) {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }
        self.theta = self.rng.gen_range(-PI..PI);
        self.theta_dot = self.rng.gen_range(-1.0..1.0);
        self.steps = 0;
        (self.observation(), EnvInfo::new())
    }

    fn step(&mut self, action: &Array1<f32>) -> StepResult {
        let torque = action[0].clamp(-1.0, 1.0) * self.max_torque;

        let angle = angle_normalize(self.theta);
        let cost =
            angle * angle + 0.1 * self.theta_dot * self.theta_dot + 0.001 * torque * torque;

        let accel = 3.0 * self.gravity / (2.0 * self.length) * self.theta.sin()
            + 3.0 / (self.mass * self.length * self.length) * torque;
        self.theta_dot = (self.theta_dot + accel * self.dt).clamp(-self.max_speed, self.max_speed);
        self.theta += self.theta_dot * self.dt;
        self.steps += 1;

        StepResult {
            observation: self.observation(),
            reward: -cost,
            terminated: false,
            truncated: self.steps >= self.max_steps,
            info: EnvInfo::new(),
        }
    }

    fn render(&self) -> Option<String> {
        Some(format!(
            "theta {:+.3} rad, theta_dot {:+.3} rad/s",
            angle_normalize(self.theta),
            self.theta_dot
        ))
    }
}
