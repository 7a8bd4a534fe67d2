//! Run configuration.
//!
//! All values are plain scalars/booleans read once at process start; there is
//! no dynamic reconfiguration. YAML group names (`run`, `env`, `world_model`,
//! `tdmpc2`, `bmpc`) follow the upstream experiment files.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PlanError, Result};

/// Experiment-level scheduling. No planner logic depends on this group.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base random seed
    pub seed: u64,
    /// Total environment steps to run
    pub max_steps: u64,
    /// Replay buffer capacity (FIFO eviction beyond this)
    pub buffer_size: usize,
    /// Save-hook interval in environment steps
    pub save_interval_steps: u64,
    /// Metric logging interval in environment steps
    pub log_interval_steps: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            max_steps: 1_000_000,
            buffer_size: 1_000_000,
            save_interval_steps: 50_000,
            log_interval_steps: 1_000,
        }
    }
}

/// Environment selection and stepping.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Environment backend ("builtin" selects the bundled envs)
    pub backend: String,
    /// Environment id within the backend
    pub env_id: String,
    /// Number of concurrently driven environment instances
    pub num_envs: usize,
    /// Update-to-data ratio: model-update invocations per environment step
    pub utd_ratio: f64,
    /// Step environments on a worker thread instead of inline
    pub asynchronous: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            backend: "builtin".to_string(),
            env_id: "pendulum".to_string(),
            num_envs: 1,
            utd_ratio: 1.0,
            asynchronous: false,
        }
    }
}

/// World model shape. Consumed read-only by the planner for rollouts;
/// `max_grad_norm` is carried for the external update hook.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldModelConfig {
    /// Latent state dimension
    pub latent_dim: usize,
    /// Members in the value ensemble
    pub num_value_nets: usize,
    /// Bins in the two-hot value/reward distributions
    pub num_bins: usize,
    /// Lower end of the bin range, in symlog space
    pub symlog_min: f32,
    /// Upper end of the bin range, in symlog space
    pub symlog_max: f32,
    /// Group size for simplicial normalization of latents
    pub simnorm_dim: usize,
    /// Gradient clipping norm for the external optimizer
    pub max_grad_norm: f32,
}

impl Default for WorldModelConfig {
    fn default() -> Self {
        Self {
            latent_dim: 512,
            num_value_nets: 5,
            num_bins: 101,
            symlog_min: -10.0,
            symlog_max: 10.0,
            simnorm_dim: 8,
            max_grad_norm: 20.0,
        }
    }
}

/// Planner hyperparameters (YAML group `tdmpc2`).
///
/// `rho`, the `*_coef` weights and `tau` parameterize the external training
/// losses and target-network tracking; they are validated here but never
/// enter the planning return (`discount` alone governs that).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Plan with MPPI; `false` acts directly from the policy prior mean
    pub mpc: bool,
    /// Planning horizon (action-sequence length)
    pub horizon: usize,
    /// MPPI refinement iterations per planning call
    pub mppi_iterations: usize,
    /// Action sequences sampled per iteration
    pub population_size: usize,
    /// Portion of the population drawn from the policy prior
    pub policy_prior_samples: usize,
    /// Elites kept for the distribution update
    pub num_elites: usize,
    /// Lower clamp for the plan standard deviation
    pub min_plan_std: f32,
    /// Upper clamp for the plan standard deviation
    pub max_plan_std: f32,
    /// Softmax temperature for elite re-weighting
    pub temperature: f32,
    /// Scale applied to the policy prior std when sampling prior sequences
    pub policy_std_scale: f32,
    /// Discount factor for planning rollouts and reanalysis targets
    pub discount: f32,
    /// Per-step weighting inside the external consistency loss
    pub rho: f32,
    /// Consistency loss weight (external optimizer)
    pub consistency_coef: f32,
    /// Reward loss weight (external optimizer)
    pub reward_coef: f32,
    /// Value loss weight (external optimizer)
    pub value_coef: f32,
    /// Continuation loss weight (external optimizer)
    pub continue_coef: f32,
    /// Target-network EMA coefficient (external optimizer)
    pub tau: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            mpc: true,
            horizon: 3,
            mppi_iterations: 6,
            population_size: 512,
            policy_prior_samples: 24,
            num_elites: 64,
            min_plan_std: 0.05,
            max_plan_std: 2.0,
            temperature: 0.5,
            policy_std_scale: 1.0,
            discount: 0.99,
            rho: 0.5,
            consistency_coef: 20.0,
            reward_coef: 0.1,
            value_coef: 0.1,
            continue_coef: 1.0,
            tau: 0.01,
        }
    }
}

/// Reanalysis hyperparameters (YAML group `bmpc`).
///
/// `reanalyze_interval` and `policy_update_interval` are independent
/// schedules; they may be equal or different, and reanalysis always uses
/// whatever parameters are current at invocation time.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReanalyzeConfig {
    /// Trigger reanalysis every this many environment steps
    pub reanalyze_interval: u64,
    /// Trigger the external policy update every this many environment steps
    pub policy_update_interval: u64,
    /// Windows refreshed per reanalysis cycle
    pub reanalyze_batch_size: usize,
    /// Rollout length per refreshed window (independent of planning horizon)
    pub reanalyze_horizon: usize,
}

impl Default for ReanalyzeConfig {
    fn default() -> Self {
        Self {
            reanalyze_interval: 100,
            policy_update_interval: 1,
            reanalyze_batch_size: 256,
            reanalyze_horizon: 5,
        }
    }
}

/// Complete run configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub env: EnvConfig,
    pub world_model: WorldModelConfig,
    #[serde(rename = "tdmpc2")]
    pub planner: PlannerConfig,
    #[serde(rename = "bmpc")]
    pub reanalyze: ReanalyzeConfig,
}

impl Config {
    /// Parse and validate a YAML config file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate a YAML config string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every startup invariant. Violations are fatal: callers must not
    /// construct planner or reanalysis components from a rejected config.
    pub fn validate(&self) -> Result<()> {
        let p = &self.planner;
        if p.horizon < 1 {
            return Err(invalid("horizon must be >= 1"));
        }
        if p.mppi_iterations < 1 {
            return Err(invalid("mppi_iterations must be >= 1"));
        }
        if p.num_elites < 1 {
            return Err(invalid("num_elites must be >= 1"));
        }
        if p.num_elites > p.population_size {
            return Err(invalid("num_elites must not exceed population_size"));
        }
        if p.policy_prior_samples > p.population_size {
            return Err(invalid(
                "policy_prior_samples must not exceed population_size",
            ));
        }
        if !(p.min_plan_std > 0.0) {
            return Err(invalid("min_plan_std must be positive"));
        }
        if p.min_plan_std > p.max_plan_std {
            return Err(invalid("min_plan_std must not exceed max_plan_std"));
        }
        if !(p.temperature > 0.0) {
            return Err(invalid("temperature must be positive"));
        }
        if !(p.discount > 0.0 && p.discount <= 1.0) {
            return Err(invalid("discount must be in (0, 1]"));
        }
        if !(p.policy_std_scale > 0.0) {
            return Err(invalid("policy_std_scale must be positive"));
        }
        if !(p.rho > 0.0 && p.rho <= 1.0) {
            return Err(invalid("rho must be in (0, 1]"));
        }
        if !(p.tau > 0.0 && p.tau <= 1.0) {
            return Err(invalid("tau must be in (0, 1]"));
        }
        for (name, coef) in [
            ("consistency_coef", p.consistency_coef),
            ("reward_coef", p.reward_coef),
            ("value_coef", p.value_coef),
            ("continue_coef", p.continue_coef),
        ] {
            if !(coef >= 0.0) {
                return Err(invalid(&format!("{name} must be non-negative")));
            }
        }

        let w = &self.world_model;
        if w.latent_dim < 1 {
            return Err(invalid("latent_dim must be >= 1"));
        }
        if w.num_bins < 2 {
            return Err(invalid("num_bins must be >= 2"));
        }
        if w.symlog_min >= w.symlog_max {
            return Err(invalid("symlog_min must be below symlog_max"));
        }
        if w.simnorm_dim < 1 || w.latent_dim % w.simnorm_dim != 0 {
            return Err(invalid("latent_dim must be a multiple of simnorm_dim"));
        }
        if w.num_value_nets < 1 {
            return Err(invalid("num_value_nets must be >= 1"));
        }
        if !(w.max_grad_norm > 0.0) {
            return Err(invalid("max_grad_norm must be positive"));
        }

        let r = &self.reanalyze;
        if r.reanalyze_interval < 1 {
            return Err(invalid("reanalyze_interval must be >= 1"));
        }
        if r.policy_update_interval < 1 {
            return Err(invalid("policy_update_interval must be >= 1"));
        }
        if r.reanalyze_batch_size < 1 {
            return Err(invalid("reanalyze_batch_size must be >= 1"));
        }
        if r.reanalyze_horizon < 1 {
            return Err(invalid("reanalyze_horizon must be >= 1"));
        }

        if self.run.buffer_size < 1 {
            return Err(invalid("buffer_size must be >= 1"));
        }
        if self.run.log_interval_steps < 1 {
            return Err(invalid("log_interval_steps must be >= 1"));
        }
        if self.env.num_envs < 1 {
            return Err(invalid("num_envs must be >= 1"));
        }
        if !(self.env.utd_ratio >= 0.0) {
            return Err(invalid("utd_ratio must be non-negative"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> PlanError {
    PlanError::Config(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_elites_exceed_population_rejected() {
        let mut cfg = Config::default();
        cfg.planner.num_elites = cfg.planner.population_size + 1;
        assert!(matches!(cfg.validate(), Err(crate::PlanError::Config(_))));
    }

    #[test]
    fn test_prior_samples_exceed_population_rejected() {
        let mut cfg = Config::default();
        cfg.planner.policy_prior_samples = cfg.planner.population_size + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_std_bounds_rejected() {
        let mut cfg = Config::default();
        cfg.planner.min_plan_std = 0.5;
        cfg.planner.max_plan_std = 0.1;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.planner.min_plan_std = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_simnorm_divisibility_rejected() {
        let mut cfg = Config::default();
        cfg.world_model.latent_dim = 100;
        cfg.world_model.simnorm_dim = 7;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let mut cfg = Config::default();
        cfg.planner.horizon = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_training_side_params_validated() {
        let mut cfg = Config::default();
        cfg.planner.rho = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.planner.tau = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.planner.reward_coef = -0.1;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.world_model.max_grad_norm = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back = Config::from_yaml_str(&yaml).unwrap();
        assert_eq!(back.planner.population_size, cfg.planner.population_size);
        assert_eq!(back.reanalyze.reanalyze_interval, cfg.reanalyze.reanalyze_interval);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let cfg = Config::from_yaml_str(
            "run:\n  seed: 7\ntdmpc2:\n  horizon: 5\n",
        )
        .unwrap();
        assert_eq!(cfg.run.seed, 7);
        assert_eq!(cfg.planner.horizon, 5);
        assert_eq!(cfg.planner.population_size, PlannerConfig::default().population_size);
    }

    #[test]
    fn test_invalid_yaml_values_rejected_on_load() {
        let err = Config::from_yaml_str("tdmpc2:\n  num_elites: 9999\n");
        assert!(err.is_err());
    }
}
