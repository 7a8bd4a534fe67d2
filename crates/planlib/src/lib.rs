//! # planlib
//!
//! A model-predictive control planning library for model-based RL in Rust.
//!
//! ## Overview
//!
//! planlib provides:
//! - An MPPI trajectory optimizer over a learned latent world model
//! - Periodic reanalysis of replay targets with current model parameters
//! - A FIFO replay buffer and a training orchestrator driving both
//! - Vectorized environment execution (serial and async)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use planlib::prelude::*;
//! use rand::SeedableRng;
//!
//! let cfg = Config::default();
//! cfg.validate().unwrap();
//!
//! let model = LatentWorldModel::new(&cfg.world_model, 3, 1, cfg.run.seed);
//! let planner = MppiPlanner::new(&cfg.planner, 1, ActionSelect::EliteSample).unwrap();
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(cfg.run.seed);
//! let latent = model.encode(&ndarray::arr1(&[0.0, 1.0, 0.0]));
//! let plan = planner.plan(&model, &latent, None, &mut rng).unwrap();
//! assert_eq!(plan.action.len(), 1);
//! ```

pub mod buffer;
pub mod config;
pub mod env;
pub mod log;
pub mod math;
pub mod model;
pub mod plan;
pub mod reanalyze;
pub mod spaces;
pub mod trainer;
pub mod vector;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::buffer::{ReplayBuffer, ReplayEntry};
    pub use crate::config::{
        Config, EnvConfig, PlannerConfig, ReanalyzeConfig, RunConfig, WorldModelConfig,
    };
    pub use crate::env::{ControlEnv, EnvInfo, StepResult};
    pub use crate::log::{CompositeLogger, ConsoleLogger, MetricLogger, NoOpLogger};
    pub use crate::model::{Latent, LatentWorldModel, ModelVault, WorldModel};
    pub use crate::plan::{ActionSelect, MppiPlanner, Plan, PlanDistribution, PlanningMode};
    pub use crate::reanalyze::{ReanalysisManager, ReanalyzeOutcome};
    pub use crate::spaces::BoxSpace;
    pub use crate::trainer::{EvalReport, NoOpHook, Orchestrator, TrainReport, UpdateHook};
    pub use crate::vector::{AsyncVecEnv, Serial, VecEnvBackend, VecEnvResult};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Invalid hyperparameter combination, detected at startup. Fatal: the
    /// offending component refuses construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// Every rollout sample in a planning population produced non-finite
    /// predictions. The planning call cannot produce an action; the caller
    /// decides whether to retry or abort.
    #[error("planning exhausted: all {discarded} rollout samples were non-finite")]
    PlanningExhausted { discarded: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, PlanError>;
