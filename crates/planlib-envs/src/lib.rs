//! Built-in continuous-control environments.
//!
//! Small tasks for exercising the planner end to end:
//! - `Pendulum` - torque-limited swing-up, dense shaped cost
//! - `PointMass` - 2D reach task with a terminal goal region
//! - `LinearTrack` - 1D diagnostic paying reward for positive thrust
//!
//! All of them take actions in `[-1, 1]^d` and scale internally.

mod linear_track;
mod pendulum;
mod point_mass;

pub use linear_track::LinearTrack;
pub use pendulum::Pendulum;
pub use point_mass::PointMass;

use planlib::env::ControlEnv;
use planlib::{PlanError, Result};

/// Instantiate a bundled environment by id.
pub fn make(env_id: &str) -> Result<Box<dyn ControlEnv>> {
    match env_id {
        "pendulum" => Ok(Box::new(Pendulum::new())),
        "point_mass" => Ok(Box::new(PointMass::new())),
        "linear_track" => Ok(Box::new(LinearTrack::new())),
        other => Err(PlanError::Config(format!(
            "unknown env_id '{}', available: {}",
            other,
            available().join(", ")
        ))),
    }
}

/// Ids accepted by [`make`].
pub fn available() -> Vec<&'static str> {
    vec!["pendulum", "point_mass", "linear_track"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_ids() {
        for id in available() {
            let env = make(id).unwrap();
            assert!(env.observation_space().dim() > 0);
            assert!(env.action_space().dim() > 0);
        }
        assert!(make("no_such_env").is_err());
    }
}
