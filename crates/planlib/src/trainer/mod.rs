//! Collection-and-planning orchestrator.
//!
//! Drives the synchronous loop: encode observations, plan one action per
//! environment, step the batch, store transitions, then run whatever the
//! schedules owe (model updates by the update-to-data budget, policy
//! updates, reanalysis, checkpoints, metric logging). Planning always works
//! on an immutable snapshot from the vault, so updates published mid-loop
//! take effect at the next planning call, never during one.

mod hook;

pub use hook::{NoOpHook, UpdateHook};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::buffer::{ReplayBuffer, ReplayEntry};
use crate::config::Config;
use crate::log::{MetricLogger, NoOpLogger};
use crate::model::{ModelVault, WorldModel};
use crate::plan::{ActionSelect, MppiPlanner, PlanDistribution};
use crate::reanalyze::{ReanalysisManager, ReanalyzeOutcome};
use crate::vector::VecEnvBackend;
use crate::{PlanError, Result};

/// Whether advancing from `prev` to `now` crossed a multiple of `every`.
/// Step counters advance by `num_envs` per loop, so schedules cannot rely
/// on exact equality.
fn crossed(prev: u64, now: u64, every: u64) -> bool {
    every > 0 && prev / every != now / every
}

/// Summary of a finished collection run.
#[derive(Clone, Debug)]
pub struct TrainReport {
    pub steps: u64,
    pub episodes: u64,
    pub mean_return: f64,
    pub model_version: u64,
    pub reanalyzed_cycles: u64,
    pub skipped_cycles: u64,
    pub elapsed_secs: f64,
}

/// Summary of an evaluation run.
#[derive(Clone, Debug)]
pub struct EvalReport {
    pub episodes: u64,
    pub mean_return: f64,
    pub mean_length: f64,
}

pub struct Orchestrator<M, B, U>
where
    M: WorldModel,
    B: VecEnvBackend,
    U: UpdateHook<M>,
{
    config: Config,
    vecenv: B,
    vault: Arc<ModelVault<M>>,
    planner: MppiPlanner,
    buffer: ReplayBuffer,
    reanalysis: ReanalysisManager,
    hook: U,
    logger: Box<dyn MetricLogger>,
    rng: StdRng,
    global_step: u64,
    start_time: Instant,
    // Per-env warm starts, in env index order. Reset at episode boundaries.
    warm: Vec<Option<PlanDistribution>>,
    // Fractional model updates owed by the update-to-data ratio.
    update_debt: f64,
    recent_returns: VecDeque<f32>,
    episodes: u64,
    reanalyzed_cycles: u64,
    skipped_cycles: u64,
    window_return_sum: f64,
    window_plans: u64,
}

impl<M, B, U> Orchestrator<M, B, U>
where
    M: WorldModel,
    B: VecEnvBackend,
    U: UpdateHook<M>,
{
    /// Validate the configuration against the environment and model shapes
    /// and assemble the full loop. Fails before any environment interaction.
    pub fn new(config: Config, vecenv: B, model: M, hook: U) -> Result<Self> {
        config.validate()?;
        let action_dim = vecenv.action_space().dim();
        if model.action_dim() != action_dim {
            return Err(PlanError::Config(format!(
                "model action_dim {} does not match environment action_dim {}",
                model.action_dim(),
                action_dim
            )));
        }
        if vecenv.num_envs() != config.env.num_envs {
            return Err(PlanError::Config(format!(
                "backend drives {} envs but num_envs is {}",
                vecenv.num_envs(),
                config.env.num_envs
            )));
        }

        let planner = MppiPlanner::new(&config.planner, action_dim, ActionSelect::EliteSample)?;
        let reanalysis = ReanalysisManager::new(&config.reanalyze, config.planner.discount)?;
        let buffer = ReplayBuffer::new(config.run.buffer_size);
        let warm = vec![None; config.env.num_envs];
        let rng = StdRng::seed_from_u64(config.run.seed);

        Ok(Self {
            vecenv,
            vault: Arc::new(ModelVault::new(model)),
            planner,
            buffer,
            reanalysis,
            hook,
            logger: Box::new(NoOpLogger),
            rng,
            global_step: 0,
            start_time: Instant::now(),
            warm,
            update_debt: 0.0,
            recent_returns: VecDeque::with_capacity(100),
            episodes: 0,
            reanalyzed_cycles: 0,
            skipped_cycles: 0,
            window_return_sum: 0.0,
            window_plans: 0,
            config,
        })
    }

    pub fn with_logger(mut self, logger: Box<dyn MetricLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Shared handle to the parameter vault, e.g. for an external trainer
    /// thread that publishes on its own schedule.
    pub fn vault(&self) -> Arc<ModelVault<M>> {
        Arc::clone(&self.vault)
    }

    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    fn mean_recent_return(&self) -> f64 {
        if self.recent_returns.is_empty() {
            return 0.0;
        }
        self.recent_returns.iter().map(|&r| r as f64).sum::<f64>()
            / self.recent_returns.len() as f64
    }

    /// Run collection until `max_steps` environment steps have elapsed.
    ///
    /// Planning exhaustion aborts the run and propagates; there is no
    /// silent fallback action.
    pub fn train(&mut self) -> Result<TrainReport> {
        let num_envs = self.config.env.num_envs;
        let action_dim = self.vecenv.action_space().dim();
        let max_steps = self.config.run.max_steps;
        self.start_time = Instant::now();

        let progress = if max_steps > 0 {
            let pb = ProgressBar::new(max_steps);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let (mut observations, _) = self.vecenv.reset(Some(self.config.run.seed));
        tracing::info!(
            num_envs,
            action_dim,
            mode = ?self.planner.mode(),
            "starting collection"
        );

        while self.global_step < max_steps {
            let snapshot = self.vault.snapshot();
            let mut actions = Array2::zeros((num_envs, action_dim));
            let mut plans = Vec::with_capacity(num_envs);
            for i in 0..num_envs {
                let obs = observations.row(i).to_owned();
                let latent = snapshot.encode(&obs);
                let plan =
                    self.planner
                        .plan(&*snapshot, &latent, self.warm[i].as_ref(), &mut self.rng)?;
                actions.row_mut(i).assign(&plan.action);
                self.window_return_sum += plan.expected_return as f64;
                self.window_plans += 1;
                plans.push(plan);
            }

            let result = self.vecenv.step(&actions);
            let prev_step = self.global_step;
            self.global_step += num_envs as u64;

            for (i, plan) in plans.into_iter().enumerate() {
                let done = result.terminated[i] || result.truncated[i];
                self.buffer.push(ReplayEntry {
                    observation: observations.row(i).to_owned(),
                    action: actions.row(i).to_owned(),
                    reward: result.rewards[i],
                    continued: !done,
                    target_value: plan.expected_return,
                });
                // Warm starts never survive an episode boundary.
                self.warm[i] = (!done).then_some(plan.distribution);
                if let Some(ret) = result.infos[i].episode_return {
                    if self.recent_returns.len() == 100 {
                        self.recent_returns.pop_front();
                    }
                    self.recent_returns.push_back(ret);
                    self.episodes += 1;
                }
            }
            observations = result.observations;

            self.run_updates(prev_step);

            if self.reanalysis.due(prev_step, self.global_step) {
                let snapshot = self.vault.snapshot();
                match self
                    .reanalysis
                    .reanalyze(&mut self.buffer, &*snapshot, &mut self.rng)
                {
                    ReanalyzeOutcome::Refreshed(_) => self.reanalyzed_cycles += 1,
                    ReanalyzeOutcome::Skipped { .. } => self.skipped_cycles += 1,
                }
            }

            if crossed(prev_step, self.global_step, self.config.run.save_interval_steps) {
                let snapshot = self.vault.snapshot();
                self.hook.save(&snapshot, self.global_step);
            }

            if crossed(prev_step, self.global_step, self.config.run.log_interval_steps) {
                self.log_metrics();
            }

            if let Some(ref pb) = progress {
                pb.set_position(self.global_step.min(max_steps));
                pb.set_message(format!("return {:.1}", self.mean_recent_return()));
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message("collection complete");
        }
        self.log_metrics();
        self.logger.close();
        self.vecenv.close();

        Ok(TrainReport {
            steps: self.global_step,
            episodes: self.episodes,
            mean_return: self.mean_recent_return(),
            model_version: self.vault.version(),
            reanalyzed_cycles: self.reanalyzed_cycles,
            skipped_cycles: self.skipped_cycles,
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
        })
    }

    /// Run greedy evaluation episodes without touching the buffer or the
    /// update schedules.
    pub fn evaluate(&mut self, num_episodes: u64) -> Result<EvalReport> {
        if num_episodes == 0 {
            return Ok(EvalReport {
                episodes: 0,
                mean_return: 0.0,
                mean_length: 0.0,
            });
        }
        let num_envs = self.config.env.num_envs;
        let action_dim = self.vecenv.action_space().dim();
        let planner = MppiPlanner::new(
            &self.config.planner,
            action_dim,
            ActionSelect::DistributionMean,
        )?;

        let (mut observations, _) = self.vecenv.reset(Some(self.config.run.seed ^ 0x5eed));
        let mut warm: Vec<Option<PlanDistribution>> = vec![None; num_envs];
        let mut returns = Vec::new();
        let mut lengths = Vec::new();

        while (returns.len() as u64) < num_episodes {
            let snapshot = self.vault.snapshot();
            let mut actions = Array2::zeros((num_envs, action_dim));
            let mut plans = Vec::with_capacity(num_envs);
            for i in 0..num_envs {
                let obs = observations.row(i).to_owned();
                let latent = snapshot.encode(&obs);
                let plan = planner.plan(&*snapshot, &latent, warm[i].as_ref(), &mut self.rng)?;
                actions.row_mut(i).assign(&plan.action);
                plans.push(plan);
            }
            let result = self.vecenv.step(&actions);
            for (i, plan) in plans.into_iter().enumerate() {
                let done = result.terminated[i] || result.truncated[i];
                warm[i] = (!done).then_some(plan.distribution);
                if let Some(ret) = result.infos[i].episode_return {
                    returns.push(ret as f64);
                    lengths.push(result.infos[i].episode_length.unwrap_or(0.0) as f64);
                }
            }
            observations = result.observations;
        }

        Ok(EvalReport {
            episodes: returns.len() as u64,
            mean_return: returns.iter().sum::<f64>() / returns.len() as f64,
            mean_length: lengths.iter().sum::<f64>() / lengths.len() as f64,
        })
    }

    /// Pay off the update-to-data budget, then the policy schedule. Every
    /// granted call sees the latest published parameters.
    fn run_updates(&mut self, prev_step: u64) {
        let advanced = (self.global_step - prev_step) as f64;
        self.update_debt += advanced * self.config.env.utd_ratio;
        while self.update_debt >= 1.0 {
            self.update_debt -= 1.0;
            let snapshot = self.vault.snapshot();
            if let Some(model) = self.hook.update_model(&snapshot, &self.buffer, self.global_step) {
                let version = self.vault.publish(model);
                tracing::debug!(version, "published updated model");
            }
        }

        if crossed(
            prev_step,
            self.global_step,
            self.config.reanalyze.policy_update_interval,
        ) {
            let snapshot = self.vault.snapshot();
            if let Some(model) = self.hook.update_policy(&snapshot, &self.buffer, self.global_step)
            {
                let version = self.vault.publish(model);
                tracing::debug!(version, "published updated policy");
            }
        }
    }

    fn log_metrics(&mut self) {
        let elapsed = self.start_time.elapsed().as_secs_f64().max(1e-9);
        let mut metrics = HashMap::new();
        metrics.insert("env/mean_return".to_string(), self.mean_recent_return());
        metrics.insert("env/episodes".to_string(), self.episodes as f64);
        metrics.insert("buffer/size".to_string(), self.buffer.len() as f64);
        metrics.insert(
            "buffer/evicted".to_string(),
            self.buffer.total_evicted() as f64,
        );
        metrics.insert("model/version".to_string(), self.vault.version() as f64);
        metrics.insert(
            "reanalyze/cycles".to_string(),
            self.reanalyzed_cycles as f64,
        );
        metrics.insert("reanalyze/skipped".to_string(), self.skipped_cycles as f64);
        metrics.insert("time/sps".to_string(), self.global_step as f64 / elapsed);
        if self.window_plans > 0 {
            metrics.insert(
                "plan/expected_return".to_string(),
                self.window_return_sum / self.window_plans as f64,
            );
        }
        self.window_return_sum = 0.0;
        self.window_plans = 0;
        self.logger.log_metrics(&metrics, self.global_step);
    }
}
