//! Periodic refresh of stored value targets.
//!
//! Reanalysis re-rolls short latent horizons from stored observations using
//! whatever model parameters are current at invocation time, then overwrites
//! each sampled entry's target in place. Actions come from the current
//! policy prior, never from the logged actions; that is what separates
//! reanalysis from plain replay.

use rand::Rng;

use crate::buffer::ReplayBuffer;
use crate::config::ReanalyzeConfig;
use crate::model::WorldModel;
use crate::plan::policy_rollout_return;
use crate::{PlanError, Result};

/// Outcome of one reanalysis cycle. A skip is an expected condition early
/// in training, not an error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReanalyzeOutcome {
    Refreshed(ReanalyzeStats),
    /// Buffer held fewer entries than one batch. Retried next interval.
    Skipped { available: usize, required: usize },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReanalyzeStats {
    /// Sampled windows whose target was overwritten.
    pub refreshed: usize,
    /// Sampled windows dropped for non-finite rollouts.
    pub discarded: usize,
    pub mean_target: f32,
    pub mean_abs_delta: f32,
}

pub struct ReanalysisManager {
    cfg: ReanalyzeConfig,
    discount: f32,
}

impl ReanalysisManager {
    pub fn new(cfg: &ReanalyzeConfig, discount: f32) -> Result<Self> {
        if cfg.reanalyze_interval < 1 {
            return Err(PlanError::Config("reanalyze_interval must be >= 1".into()));
        }
        if cfg.reanalyze_batch_size < 1 || cfg.reanalyze_horizon < 1 {
            return Err(PlanError::Config(
                "reanalyze_batch_size and reanalyze_horizon must be >= 1".into(),
            ));
        }
        if !(discount > 0.0 && discount <= 1.0) {
            return Err(PlanError::Config("discount must be in (0, 1]".into()));
        }
        Ok(Self {
            cfg: cfg.clone(),
            discount,
        })
    }

    /// Whether advancing the step counter from `prev` to `now` crosses a
    /// reanalysis boundary. Step counters may advance by more than one per
    /// loop iteration when several environments step together.
    pub fn due(&self, prev: u64, now: u64) -> bool {
        prev / self.cfg.reanalyze_interval != now / self.cfg.reanalyze_interval
    }

    /// Refresh one batch of stored targets in place.
    ///
    /// Buffer size and entry ordering never change; only `target_value`
    /// fields of sampled entries are written. Windows are bounded by both
    /// `reanalyze_horizon` and the logged episode boundary.
    pub fn reanalyze<M, R>(
        &self,
        buffer: &mut ReplayBuffer,
        model: &M,
        rng: &mut R,
    ) -> ReanalyzeOutcome
    where
        M: WorldModel + ?Sized,
        R: Rng,
    {
        if buffer.len() < self.cfg.reanalyze_batch_size {
            let outcome = ReanalyzeOutcome::Skipped {
                available: buffer.len(),
                required: self.cfg.reanalyze_batch_size,
            };
            tracing::warn!(
                available = buffer.len(),
                required = self.cfg.reanalyze_batch_size,
                "reanalysis skipped, buffer below one batch"
            );
            return outcome;
        }

        let indices = buffer.sample_indices(self.cfg.reanalyze_batch_size, rng);
        let mut refreshed = 0usize;
        let mut discarded = 0usize;
        let mut target_sum = 0.0f64;
        let mut delta_sum = 0.0f64;

        for ix in indices {
            let (observation, old_target) = {
                let entry = buffer.entry(ix).unwrap();
                (entry.observation.clone(), entry.target_value)
            };
            let steps = self.cfg.reanalyze_horizon.min(buffer.episode_len_from(ix));
            let latent = model.encode(&observation);
            match policy_rollout_return(model, &latent, steps, self.discount) {
                Some(target) => {
                    buffer.set_target_value(ix, target);
                    refreshed += 1;
                    target_sum += target as f64;
                    delta_sum += (target - old_target).abs() as f64;
                }
                None => discarded += 1,
            }
        }

        let stats = ReanalyzeStats {
            refreshed,
            discarded,
            mean_target: if refreshed > 0 {
                (target_sum / refreshed as f64) as f32
            } else {
                0.0
            },
            mean_abs_delta: if refreshed > 0 {
                (delta_sum / refreshed as f64) as f32
            } else {
                0.0
            },
        };
        if discarded > 0 {
            tracing::warn!(refreshed, discarded, "reanalysis dropped non-finite rollouts");
        } else {
            tracing::debug!(
                refreshed,
                mean_target = stats.mean_target,
                mean_abs_delta = stats.mean_abs_delta,
                "reanalysis refreshed targets"
            );
        }
        ReanalyzeOutcome::Refreshed(stats)
    }
}
