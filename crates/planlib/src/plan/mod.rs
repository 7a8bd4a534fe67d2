//! Sampling-based trajectory optimization (MPPI) over a latent world model.
//!
//! Each planning call refines a per-timestep Gaussian over action sequences:
//! sample a population (part policy prior, part current Gaussian), score
//! every sequence by latent rollout, keep the elites and refit the Gaussian
//! to their softmax-weighted statistics. The final distribution is returned
//! for warm-starting the next call.

mod rollout;

pub use rollout::{policy_rollout_return, rollout_return};

use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::config::PlannerConfig;
use crate::math::softmax_in_place;
use crate::model::{Latent, WorldModel};
use crate::{PlanError, Result};

/// How `plan` turns the final distribution into the action to execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionSelect {
    /// Sample one elite in proportion to its softmax weight, then add
    /// exploration noise at `min_plan_std`. Collection-time default.
    EliteSample,
    /// First timestep of the final mean, no noise. Evaluation default.
    DistributionMean,
}

/// Planner behavior, fixed at construction from the `mpc` flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanningMode {
    /// Full MPPI refinement.
    MpcPlan,
    /// Act straight from the policy prior without refinement.
    DirectPolicy,
}

/// Per-timestep Gaussian over action sequences. Rows index timesteps.
#[derive(Clone, Debug)]
pub struct PlanDistribution {
    pub mean: Array2<f32>,
    pub std: Array2<f32>,
}

impl PlanDistribution {
    /// Zero mean at maximum std. Used when no warm start is available.
    pub fn cold(horizon: usize, action_dim: usize, max_plan_std: f32) -> Self {
        Self {
            mean: Array2::zeros((horizon, action_dim)),
            std: Array2::from_elem((horizon, action_dim), max_plan_std),
        }
    }

    /// Warm-start shift: drop the first timestep, duplicate the last, and
    /// clamp std back into bounds.
    pub fn shifted(&self, min_plan_std: f32, max_plan_std: f32) -> Self {
        let (horizon, action_dim) = self.mean.dim();
        let mut mean = Array2::zeros((horizon, action_dim));
        let mut std = Array2::zeros((horizon, action_dim));
        for t in 0..horizon {
            let src = (t + 1).min(horizon - 1);
            mean.row_mut(t).assign(&self.mean.row(src));
            std.row_mut(t).assign(&self.std.row(src));
        }
        std.mapv_inplace(|s| s.clamp(min_plan_std, max_plan_std));
        Self { mean, std }
    }

    pub fn horizon(&self) -> usize {
        self.mean.nrows()
    }

    pub fn action_dim(&self) -> usize {
        self.mean.ncols()
    }
}

/// Outcome of one planning call.
#[derive(Clone, Debug)]
pub struct Plan {
    /// Action to execute now, clipped to `[-1, 1]`.
    pub action: Array1<f32>,
    /// Final distribution, to warm-start the next call for the same
    /// environment instance.
    pub distribution: PlanDistribution,
    /// Softmax-weighted elite return. Seeds the stored value target when
    /// the transition enters the replay buffer.
    pub expected_return: f32,
}

pub struct MppiPlanner {
    cfg: PlannerConfig,
    action_dim: usize,
    mode: PlanningMode,
    select: ActionSelect,
}

impl MppiPlanner {
    /// Construct a planner, rejecting invalid hyperparameter combinations.
    /// A planner that constructs successfully can always plan.
    pub fn new(cfg: &PlannerConfig, action_dim: usize, select: ActionSelect) -> Result<Self> {
        if action_dim < 1 {
            return Err(PlanError::Config("action_dim must be >= 1".into()));
        }
        if cfg.horizon < 1 {
            return Err(PlanError::Config("horizon must be >= 1".into()));
        }
        if cfg.mppi_iterations < 1 {
            return Err(PlanError::Config("mppi_iterations must be >= 1".into()));
        }
        if cfg.num_elites < 1 || cfg.num_elites > cfg.population_size {
            return Err(PlanError::Config(
                "population_size >= num_elites >= 1 must hold".into(),
            ));
        }
        if cfg.policy_prior_samples > cfg.population_size {
            return Err(PlanError::Config(
                "policy_prior_samples must not exceed population_size".into(),
            ));
        }
        if !(cfg.min_plan_std > 0.0) || cfg.min_plan_std > cfg.max_plan_std {
            return Err(PlanError::Config(
                "0 < min_plan_std <= max_plan_std must hold".into(),
            ));
        }
        if !(cfg.temperature > 0.0) {
            return Err(PlanError::Config("temperature must be positive".into()));
        }
        if !(cfg.discount > 0.0 && cfg.discount <= 1.0) {
            return Err(PlanError::Config("discount must be in (0, 1]".into()));
        }
        let mode = if cfg.mpc {
            PlanningMode::MpcPlan
        } else {
            PlanningMode::DirectPolicy
        };
        Ok(Self {
            cfg: cfg.clone(),
            action_dim,
            mode,
            select,
        })
    }

    pub fn mode(&self) -> PlanningMode {
        self.mode
    }

    /// Produce one action from `latent0`.
    ///
    /// `warm` is the previous call's distribution for the same environment
    /// instance; calls for one instance must arrive in execution order.
    pub fn plan<M, R>(
        &self,
        model: &M,
        latent0: &Latent,
        warm: Option<&PlanDistribution>,
        rng: &mut R,
    ) -> Result<Plan>
    where
        M: WorldModel + ?Sized,
        R: Rng,
    {
        match self.mode {
            PlanningMode::MpcPlan => self.mppi(model, latent0, warm, rng),
            PlanningMode::DirectPolicy => self.direct(model, latent0, rng),
        }
    }

    fn mppi<M, R>(
        &self,
        model: &M,
        latent0: &Latent,
        warm: Option<&PlanDistribution>,
        rng: &mut R,
    ) -> Result<Plan>
    where
        M: WorldModel + ?Sized,
        R: Rng,
    {
        let pop = self.cfg.population_size;
        let prior_n = self.cfg.policy_prior_samples;

        let mut dist = match warm {
            Some(prev) => prev.shifted(self.cfg.min_plan_std, self.cfg.max_plan_std),
            None => PlanDistribution::cold(self.cfg.horizon, self.action_dim, self.cfg.max_plan_std),
        };

        let mut sequences: Vec<Array2<f32>> = Vec::with_capacity(pop);
        let mut scores = vec![0.0f32; pop];
        let mut elites: Vec<usize> = Vec::new();
        let mut weights: Vec<f32> = Vec::new();

        for _ in 0..self.cfg.mppi_iterations {
            sequences.clear();
            for _ in 0..prior_n {
                sequences.push(self.sample_prior_sequence(model, latent0, rng));
            }
            for _ in prior_n..pop {
                sequences.push(self.sample_gaussian_sequence(&dist, rng));
            }

            let mut discarded = 0;
            for (i, seq) in sequences.iter().enumerate() {
                scores[i] = match rollout_return(model, latent0, seq, self.cfg.discount) {
                    Some(score) => score,
                    None => {
                        discarded += 1;
                        f32::NEG_INFINITY
                    }
                };
            }
            if discarded == pop {
                return Err(PlanError::PlanningExhausted { discarded });
            }

            elites = select_elites(&scores, self.cfg.num_elites);
            weights = elite_weights(&scores, &elites, self.cfg.temperature);
            self.refit(&mut dist, &sequences, &elites, &weights);
        }

        let mut expected_return = 0.0;
        for (&e, &w) in elites.iter().zip(&weights) {
            if w > 0.0 {
                expected_return += w * scores[e];
            }
        }

        let action = match self.select {
            ActionSelect::DistributionMean => dist.mean.row(0).to_owned(),
            ActionSelect::EliteSample => {
                let chosen = match WeightedIndex::new(weights.iter().copied()) {
                    Ok(index) => elites[index.sample(rng)],
                    Err(_) => elites[0],
                };
                let mut action = sequences[chosen].row(0).to_owned();
                for v in action.iter_mut() {
                    let eps: f32 = rng.sample(StandardNormal);
                    *v = (*v + self.cfg.min_plan_std * eps).clamp(-1.0, 1.0);
                }
                action
            }
        };

        Ok(Plan {
            action,
            distribution: dist,
            expected_return,
        })
    }

    /// Act from the policy prior at `latent0`. The returned distribution
    /// carries the prior over the whole horizon so a later switch to MPC
    /// warm-starts from something sensible.
    fn direct<M, R>(&self, model: &M, latent0: &Latent, rng: &mut R) -> Result<Plan>
    where
        M: WorldModel + ?Sized,
        R: Rng,
    {
        let (mean, std) = model.policy_moments(latent0);
        let value = model.value(latent0);
        if mean.iter().chain(std.iter()).any(|v| !v.is_finite()) || !value.is_finite() {
            return Err(PlanError::PlanningExhausted { discarded: 1 });
        }

        let action = match self.select {
            ActionSelect::DistributionMean => mean.mapv(|v| v.clamp(-1.0, 1.0)),
            ActionSelect::EliteSample => {
                let mut action = mean.clone();
                for (v, &s) in action.iter_mut().zip(std.iter()) {
                    let eps: f32 = rng.sample(StandardNormal);
                    *v = (*v + s * eps).clamp(-1.0, 1.0);
                }
                action
            }
        };

        let clamped =
            std.mapv(|s| s.clamp(self.cfg.min_plan_std, self.cfg.max_plan_std));
        let mut distribution =
            PlanDistribution::cold(self.cfg.horizon, self.action_dim, self.cfg.max_plan_std);
        for t in 0..self.cfg.horizon {
            distribution.mean.row_mut(t).assign(&mean);
            distribution.std.row_mut(t).assign(&clamped);
        }

        Ok(Plan {
            action,
            distribution,
            expected_return: value,
        })
    }

    fn sample_prior_sequence<M, R>(&self, model: &M, latent0: &Latent, rng: &mut R) -> Array2<f32>
    where
        M: WorldModel + ?Sized,
        R: Rng,
    {
        let mut seq = Array2::zeros((self.cfg.horizon, self.action_dim));
        let mut z = latent0.clone();
        for t in 0..self.cfg.horizon {
            let (mean, std) = model.policy_moments(&z);
            let mut action = Array1::zeros(self.action_dim);
            for i in 0..self.action_dim {
                let eps: f32 = rng.sample(StandardNormal);
                let a = mean[i] + std[i] * self.cfg.policy_std_scale * eps;
                // Scoring discards non-finite rollouts later; the sequence
                // itself must stay finite.
                action[i] = if a.is_finite() { a.clamp(-1.0, 1.0) } else { 0.0 };
            }
            seq.row_mut(t).assign(&action);
            z = model.dynamics(&z, &action);
            if z.iter().any(|v| !v.is_finite()) {
                break;
            }
        }
        seq
    }

    fn sample_gaussian_sequence<R: Rng>(&self, dist: &PlanDistribution, rng: &mut R) -> Array2<f32> {
        let (horizon, action_dim) = dist.mean.dim();
        let mut seq = Array2::zeros((horizon, action_dim));
        for t in 0..horizon {
            for i in 0..action_dim {
                let eps: f32 = rng.sample(StandardNormal);
                seq[[t, i]] = (dist.mean[[t, i]] + dist.std[[t, i]] * eps).clamp(-1.0, 1.0);
            }
        }
        seq
    }

    /// Refit the Gaussian to the weighted elite statistics, std clamped
    /// into `[min_plan_std, max_plan_std]`.
    fn refit(
        &self,
        dist: &mut PlanDistribution,
        sequences: &[Array2<f32>],
        elites: &[usize],
        weights: &[f32],
    ) {
        let (horizon, action_dim) = dist.mean.dim();
        for t in 0..horizon {
            for i in 0..action_dim {
                let mut mean = 0.0f32;
                for (&e, &w) in elites.iter().zip(weights) {
                    mean += w * sequences[e][[t, i]];
                }
                let mut var = 0.0f32;
                for (&e, &w) in elites.iter().zip(weights) {
                    let delta = sequences[e][[t, i]] - mean;
                    var += w * delta * delta;
                }
                dist.mean[[t, i]] = mean;
                dist.std[[t, i]] = var
                    .sqrt()
                    .clamp(self.cfg.min_plan_std, self.cfg.max_plan_std);
            }
        }
    }
}

/// Indices of the `k` highest scores, best first. Ties keep the earlier
/// sample, so selection is deterministic for a fixed population.
pub(crate) fn select_elites(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k);
    order
}

/// Softmax weights over elite returns at `temperature`. Discarded elites
/// carry weight exactly zero.
pub(crate) fn elite_weights(scores: &[f32], elites: &[usize], temperature: f32) -> Vec<f32> {
    let mut w: Vec<f32> = elites.iter().map(|&e| scores[e] / temperature).collect();
    softmax_in_place(&mut w);
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct StubModel {
        reward: fn(&Latent, &Array1<f32>) -> f32,
        value: f32,
        policy_mean: f32,
    }

    impl StubModel {
        fn with_reward(reward: fn(&Latent, &Array1<f32>) -> f32) -> Self {
            Self {
                reward,
                value: 0.0,
                policy_mean: 0.0,
            }
        }
    }

    impl WorldModel for StubModel {
        fn latent_dim(&self) -> usize {
            2
        }
        fn action_dim(&self) -> usize {
            1
        }
        fn encode(&self, _observation: &Array1<f32>) -> Latent {
            Array1::zeros(2)
        }
        fn dynamics(&self, latent: &Latent, _action: &Array1<f32>) -> Latent {
            latent.clone()
        }
        fn reward(&self, latent: &Latent, action: &Array1<f32>) -> f32 {
            (self.reward)(latent, action)
        }
        fn value(&self, _latent: &Latent) -> f32 {
            self.value
        }
        fn policy_moments(&self, _latent: &Latent) -> (Array1<f32>, Array1<f32>) {
            (
                Array1::from_elem(1, self.policy_mean),
                Array1::from_elem(1, 0.1),
            )
        }
    }

    fn small_cfg() -> PlannerConfig {
        PlannerConfig {
            horizon: 3,
            mppi_iterations: 4,
            population_size: 64,
            policy_prior_samples: 8,
            num_elites: 8,
            min_plan_std: 0.05,
            max_plan_std: 0.5,
            temperature: 0.5,
            discount: 0.99,
            ..PlannerConfig::default()
        }
    }

    fn seq(first_dim: &[f32]) -> Array2<f32> {
        Array2::from_shape_vec((first_dim.len(), 1), first_dim.to_vec()).unwrap()
    }

    #[test]
    fn test_construction_rejects_bad_configs() {
        let mut cfg = small_cfg();
        cfg.num_elites = cfg.population_size + 1;
        assert!(MppiPlanner::new(&cfg, 1, ActionSelect::EliteSample).is_err());

        let mut cfg = small_cfg();
        cfg.policy_prior_samples = cfg.population_size + 1;
        assert!(MppiPlanner::new(&cfg, 1, ActionSelect::EliteSample).is_err());

        let mut cfg = small_cfg();
        cfg.min_plan_std = 0.0;
        assert!(MppiPlanner::new(&cfg, 1, ActionSelect::EliteSample).is_err());

        assert!(MppiPlanner::new(&small_cfg(), 0, ActionSelect::EliteSample).is_err());
    }

    #[test]
    fn test_cold_distribution() {
        let dist = PlanDistribution::cold(4, 2, 0.7);
        assert_eq!(dist.horizon(), 4);
        assert_eq!(dist.action_dim(), 2);
        assert!(dist.mean.iter().all(|&v| v == 0.0));
        assert!(dist.std.iter().all(|&v| v == 0.7));
    }

    #[test]
    fn test_shift_drops_first_and_duplicates_last() {
        let mut dist = PlanDistribution::cold(3, 1, 2.0);
        dist.mean[[0, 0]] = 0.1;
        dist.mean[[1, 0]] = 0.2;
        dist.mean[[2, 0]] = 0.3;
        let shifted = dist.shifted(0.05, 0.5);
        assert_eq!(shifted.mean[[0, 0]], 0.2);
        assert_eq!(shifted.mean[[1, 0]], 0.3);
        assert_eq!(shifted.mean[[2, 0]], 0.3);
        // std 2.0 clamped into [0.05, 0.5]
        assert!(shifted.std.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_elites_are_sequences_with_most_positive_steps() {
        let model = StubModel::with_reward(|_, a| if a[0] > 0.0 { 1.0 } else { 0.0 });
        let z = Array1::zeros(2);
        // 3, 0, 2 and 1 positive timesteps respectively
        let population = [
            seq(&[1.0, 1.0, 1.0]),
            seq(&[-1.0, -1.0, -1.0]),
            seq(&[1.0, 1.0, -1.0]),
            seq(&[-1.0, 1.0, -1.0]),
        ];
        let scores: Vec<f32> = population
            .iter()
            .map(|s| rollout_return(&model, &z, s, 1.0).unwrap())
            .collect();
        let elites = select_elites(&scores, 2);
        assert_eq!(elites, vec![0, 2]);
    }

    #[test]
    fn test_plan_selects_most_positive_sequences_end_to_end() {
        // The two prior samples land near +0.9 and collect the step reward
        // everywhere, so they outscore whatever the Gaussian half draws and
        // the elite pair sits at the 3.0 maximum.
        let model = StubModel {
            reward: |_, a| if a[0] > 0.0 { 1.0 } else { 0.0 },
            value: 0.0,
            policy_mean: 0.9,
        };
        let cfg = PlannerConfig {
            horizon: 3,
            mppi_iterations: 1,
            population_size: 4,
            policy_prior_samples: 2,
            num_elites: 2,
            min_plan_std: 0.05,
            max_plan_std: 0.5,
            temperature: 0.5,
            discount: 1.0,
            ..PlannerConfig::default()
        };
        let planner = MppiPlanner::new(&cfg, 1, ActionSelect::DistributionMean).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let plan = planner
            .plan(&model, &Array1::zeros(2), None, &mut rng)
            .unwrap();

        assert!((plan.expected_return - 3.0).abs() < 1e-5);
        // The refit follows the all-positive elites at every timestep.
        assert!(plan.action[0] > 0.0);
        assert!(plan.distribution.mean.iter().all(|&m| m > 0.0));
    }

    #[test]
    fn test_discarded_elites_get_zero_weight() {
        let scores = vec![1.0, f32::NEG_INFINITY, 0.5];
        let elites = select_elites(&scores, 3);
        assert_eq!(elites, vec![0, 2, 1]);
        let weights = elite_weights(&scores, &elites, 0.5);
        assert_eq!(weights[2], 0.0);
        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(weights[0] > weights[1]);
    }

    #[test]
    fn test_plan_steers_toward_positive_reward() {
        let model = StubModel::with_reward(|_, a| if a[0] > 0.0 { 1.0 } else { 0.0 });
        let planner =
            MppiPlanner::new(&small_cfg(), 1, ActionSelect::DistributionMean).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let plan = planner
            .plan(&model, &Array1::zeros(2), None, &mut rng)
            .unwrap();
        assert!(plan.action[0] > 0.0);
        assert!(plan.expected_return > 0.0);
    }

    #[test]
    fn test_std_stays_within_bounds() {
        let model = StubModel::with_reward(|_, a| a[0]);
        let cfg = small_cfg();
        let planner = MppiPlanner::new(&cfg, 1, ActionSelect::EliteSample).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let plan = planner
            .plan(&model, &Array1::zeros(2), None, &mut rng)
            .unwrap();
        for &s in plan.distribution.std.iter() {
            assert!(s >= cfg.min_plan_std - 1e-6);
            assert!(s <= cfg.max_plan_std + 1e-6);
        }
        assert!(plan.action.iter().all(|&a| (-1.0..=1.0).contains(&a)));
    }

    #[test]
    fn test_warm_started_plans_stay_near_zero_under_flat_rewards() {
        let model = StubModel::with_reward(|_, _| 0.0);
        let cfg = PlannerConfig {
            horizon: 4,
            mppi_iterations: 2,
            population_size: 256,
            policy_prior_samples: 16,
            num_elites: 128,
            min_plan_std: 0.05,
            max_plan_std: 0.3,
            ..PlannerConfig::default()
        };
        let planner = MppiPlanner::new(&cfg, 1, ActionSelect::DistributionMean).unwrap();
        let mut rng = StdRng::seed_from_u64(17);
        let z = Array1::zeros(2);

        let mut warm: Option<PlanDistribution> = None;
        for _ in 0..5 {
            let plan = planner.plan(&model, &z, warm.as_ref(), &mut rng).unwrap();
            warm = Some(plan.distribution);
        }
        let dist = warm.unwrap();
        assert!(dist.mean.iter().all(|&m| m.abs() < 0.5), "{:?}", dist.mean);
    }

    #[test]
    fn test_all_non_finite_rollouts_exhaust_planning() {
        let model = StubModel::with_reward(|_, _| f32::NAN);
        let cfg = small_cfg();
        let planner = MppiPlanner::new(&cfg, 1, ActionSelect::EliteSample).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        match planner.plan(&model, &Array1::zeros(2), None, &mut rng) {
            Err(PlanError::PlanningExhausted { discarded }) => {
                assert_eq!(discarded, cfg.population_size);
            }
            other => panic!("expected planning exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_direct_policy_mode_acts_from_prior_mean() {
        let model = StubModel {
            reward: |_, _| 0.0,
            value: 0.7,
            policy_mean: 0.25,
        };
        let cfg = PlannerConfig {
            mpc: false,
            ..small_cfg()
        };
        let planner = MppiPlanner::new(&cfg, 1, ActionSelect::DistributionMean).unwrap();
        assert_eq!(planner.mode(), PlanningMode::DirectPolicy);
        let mut rng = StdRng::seed_from_u64(0);
        let plan = planner
            .plan(&model, &Array1::zeros(2), None, &mut rng)
            .unwrap();
        assert!((plan.action[0] - 0.25).abs() < 1e-6);
        assert!((plan.expected_return - 0.7).abs() < 1e-6);
        assert_eq!(plan.distribution.horizon(), cfg.horizon);
    }
}
