//! Bundled latent world model: symlog-squashed observations, simnorm
//! latents, two-hot reward and value heads, and a Gaussian policy prior
//! with squashed log-std.
//!
//! Inference only. Training happens outside this crate; updated parameters
//! arrive as whole replacement models through [`super::ModelVault`].

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::WorldModelConfig;
use crate::math::{simnorm_in_place, squash_log_std, symlog, two_hot_inv};
use crate::model::mlp::{concat, perturb_dense, Dense, NormedLinear};
use crate::model::{Latent, WorldModel};

#[derive(Clone, Debug)]
pub struct LatentWorldModel {
    cfg: WorldModelConfig,
    action_dim: usize,
    symlog_obs: bool,
    encoder: (NormedLinear, NormedLinear),
    dynamics: (NormedLinear, NormedLinear),
    reward_trunk: NormedLinear,
    reward_head: Dense,
    value_trunks: Vec<NormedLinear>,
    value_heads: Vec<Dense>,
    policy_trunk: NormedLinear,
    policy_head: Dense,
    continuation: Option<(NormedLinear, Dense)>,
}

impl LatentWorldModel {
    /// Build a freshly initialized model without a continuation head.
    /// Construction is deterministic in `seed`.
    pub fn new(cfg: &WorldModelConfig, obs_dim: usize, action_dim: usize, seed: u64) -> Self {
        Self::build(cfg, obs_dim, action_dim, seed, false)
    }

    /// Like [`Self::new`] but with a continuation head, for episodic tasks
    /// where predicted termination should cut the planning return.
    pub fn with_continue_head(
        cfg: &WorldModelConfig,
        obs_dim: usize,
        action_dim: usize,
        seed: u64,
    ) -> Self {
        Self::build(cfg, obs_dim, action_dim, seed, true)
    }

    /// Feed the encoder raw observations instead of symlog-squashed ones.
    /// Must match the transform the published parameters were trained with.
    pub fn with_raw_observations(mut self) -> Self {
        self.symlog_obs = false;
        self
    }

    fn build(
        cfg: &WorldModelConfig,
        obs_dim: usize,
        action_dim: usize,
        seed: u64,
        continuation: bool,
    ) -> Self {
        let hidden = cfg.latent_dim;
        let latent = cfg.latent_dim;
        let mut rng = StdRng::seed_from_u64(seed);

        let encoder = (
            NormedLinear::new(obs_dim, hidden, true, &mut rng),
            NormedLinear::new(hidden, latent, false, &mut rng),
        );
        let dynamics = (
            NormedLinear::new(latent + action_dim, hidden, true, &mut rng),
            NormedLinear::new(hidden, latent, false, &mut rng),
        );
        let reward_trunk = NormedLinear::new(latent + action_dim, hidden, true, &mut rng);
        // Zero-init distribution heads: a fresh model predicts the midpoint
        // of the bin range (reward and value exactly zero).
        let reward_head = Dense::zeros(hidden, cfg.num_bins);

        let mut value_trunks = Vec::with_capacity(cfg.num_value_nets);
        let mut value_heads = Vec::with_capacity(cfg.num_value_nets);
        for _ in 0..cfg.num_value_nets {
            value_trunks.push(NormedLinear::new(latent, hidden, true, &mut rng));
            value_heads.push(Dense::zeros(hidden, cfg.num_bins));
        }

        let policy_trunk = NormedLinear::new(latent, hidden, true, &mut rng);
        let policy_head = Dense::new(hidden, 2 * action_dim, &mut rng);

        let continuation = continuation.then(|| {
            (
                NormedLinear::new(latent, hidden, true, &mut rng),
                Dense::new(hidden, 1, &mut rng),
            )
        });

        Self {
            cfg: cfg.clone(),
            action_dim,
            symlog_obs: true,
            encoder,
            dynamics,
            reward_trunk,
            reward_head,
            value_trunks,
            value_heads,
            policy_trunk,
            policy_head,
            continuation,
        }
    }

    /// Clone with jittered head weights. Stands in for a training step when
    /// exercising the publish/snapshot path.
    pub fn perturbed(&self, seed: u64, scale: f32) -> Self {
        let mut out = self.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        perturb_dense(&mut out.reward_head, scale, &mut rng);
        for head in &mut out.value_heads {
            perturb_dense(head, scale, &mut rng);
        }
        perturb_dense(&mut out.policy_head, scale, &mut rng);
        out
    }

    fn decode_bins(&self, logits: &Array1<f32>) -> f32 {
        let logits = logits.as_slice().expect("head output is contiguous");
        two_hot_inv(logits, self.cfg.symlog_min, self.cfg.symlog_max)
    }

    fn value_bins(&self, trunk: &NormedLinear, head: &Dense, latent: &Latent) -> f32 {
        self.decode_bins(&head.forward(&trunk.forward(latent)))
    }
}

impl WorldModel for LatentWorldModel {
    fn latent_dim(&self) -> usize {
        self.cfg.latent_dim
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }

    fn encode(&self, observation: &Array1<f32>) -> Latent {
        let h = if self.symlog_obs {
            self.encoder.0.forward(&observation.mapv(symlog))
        } else {
            self.encoder.0.forward(observation)
        };
        let mut z = self.encoder.1.forward(&h);
        simnorm_in_place(&mut z, self.cfg.simnorm_dim);
        z
    }

    fn dynamics(&self, latent: &Latent, action: &Array1<f32>) -> Latent {
        let x = concat(latent, action);
        let mut z = self.dynamics.1.forward(&self.dynamics.0.forward(&x));
        simnorm_in_place(&mut z, self.cfg.simnorm_dim);
        z
    }

    fn reward(&self, latent: &Latent, action: &Array1<f32>) -> f32 {
        let x = concat(latent, action);
        self.decode_bins(&self.reward_head.forward(&self.reward_trunk.forward(&x)))
    }

    fn value(&self, latent: &Latent) -> f32 {
        let mut sum = 0.0;
        for (trunk, head) in self.value_trunks.iter().zip(&self.value_heads) {
            sum += self.value_bins(trunk, head, latent);
        }
        sum / self.value_heads.len() as f32
    }

    fn policy_moments(&self, latent: &Latent) -> (Array1<f32>, Array1<f32>) {
        let out = self.policy_head.forward(&self.policy_trunk.forward(latent));
        let mean = out.slice(ndarray::s![..self.action_dim]).mapv(f32::tanh);
        let std = out
            .slice(ndarray::s![self.action_dim..])
            .mapv(|raw| squash_log_std(raw).exp());
        (mean, std)
    }

    fn continue_prob(&self, latent: &Latent) -> Option<f32> {
        self.continuation.as_ref().map(|(trunk, head)| {
            let logit = head.forward(&trunk.forward(latent))[0];
            1.0 / (1.0 + (-logit).exp())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{MAX_LOG_STD, MIN_LOG_STD};

    fn small_cfg() -> WorldModelConfig {
        WorldModelConfig {
            latent_dim: 16,
            simnorm_dim: 4,
            num_value_nets: 2,
            num_bins: 11,
            ..WorldModelConfig::default()
        }
    }

    fn obs() -> Array1<f32> {
        Array1::linspace(-1.0, 1.0, 5)
    }

    #[test]
    fn test_construction_is_deterministic() {
        let cfg = small_cfg();
        let a = LatentWorldModel::new(&cfg, 5, 2, 42);
        let b = LatentWorldModel::new(&cfg, 5, 2, 42);
        assert_eq!(a.encode(&obs()), b.encode(&obs()));
    }

    #[test]
    fn test_encode_is_simplicial() {
        let cfg = small_cfg();
        let model = LatentWorldModel::new(&cfg, 5, 2, 0);
        let z = model.encode(&obs());
        assert_eq!(z.len(), 16);
        for group in z.as_slice().unwrap().chunks(4) {
            let sum: f32 = group.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert!(group.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_encode_symlog_squashes_observations() {
        let cfg = small_cfg();
        let squashed = LatentWorldModel::new(&cfg, 5, 2, 3);
        let raw = LatentWorldModel::new(&cfg, 5, 2, 3).with_raw_observations();
        let big = Array1::from_vec(vec![250.0, -40.0, 3.0, 0.5, -900.0]);

        // Same parameters, so the only difference is the input transform.
        assert_eq!(squashed.encode(&big), raw.encode(&big.mapv(symlog)));
        assert_ne!(squashed.encode(&big), raw.encode(&big));
        // symlog is the identity at the origin.
        assert_eq!(
            squashed.encode(&Array1::zeros(5)),
            raw.encode(&Array1::zeros(5))
        );
    }

    #[test]
    fn test_dynamics_stays_simplicial() {
        let cfg = small_cfg();
        let model = LatentWorldModel::new(&cfg, 5, 2, 0);
        let z = model.encode(&obs());
        let z2 = model.dynamics(&z, &Array1::from_vec(vec![0.3, -0.7]));
        let sum: f32 = z2.iter().take(4).sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_fresh_model_predicts_zero_reward_and_value() {
        let cfg = small_cfg();
        let model = LatentWorldModel::new(&cfg, 5, 2, 0);
        let z = model.encode(&obs());
        let r = model.reward(&z, &Array1::zeros(2));
        assert!(r.abs() < 1e-4, "fresh reward {r}");
        assert!(model.value(&z).abs() < 1e-4);
    }

    #[test]
    fn test_policy_moments_are_bounded() {
        let cfg = small_cfg();
        let model = LatentWorldModel::new(&cfg, 5, 2, 7);
        let z = model.encode(&obs());
        let (mean, std) = model.policy_moments(&z);
        assert_eq!(mean.len(), 2);
        assert_eq!(std.len(), 2);
        for &m in mean.iter() {
            assert!((-1.0..=1.0).contains(&m));
        }
        for &s in std.iter() {
            assert!(s >= MIN_LOG_STD.exp() - 1e-6);
            assert!(s <= MAX_LOG_STD.exp() + 1e-6);
        }
    }

    #[test]
    fn test_continue_head_optional() {
        let cfg = small_cfg();
        let without = LatentWorldModel::new(&cfg, 5, 2, 0);
        let with = LatentWorldModel::with_continue_head(&cfg, 5, 2, 0);
        let z = without.encode(&obs());
        assert!(without.continue_prob(&z).is_none());
        let p = with.continue_prob(&with.encode(&obs())).unwrap();
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn test_perturbed_model_differs() {
        let cfg = small_cfg();
        let model = LatentWorldModel::new(&cfg, 5, 2, 0);
        let bumped = model.perturbed(1, 0.5);
        let z = model.encode(&obs());
        let a = Array1::from_vec(vec![0.1, 0.1]);
        assert_ne!(model.reward(&z, &a), bumped.reward(&z, &a));
        // Encoder untouched, so latents still line up across versions.
        assert_eq!(z, bumped.encode(&obs()));
    }
}
