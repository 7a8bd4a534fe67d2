//! World model interface and the bundled latent implementation.
//!
//! The planner only ever talks to [`WorldModel`], so alternative model
//! backends can be dropped in without touching planning code. All methods
//! take `&self`: planning threads work on immutable snapshots published
//! through [`ModelVault`].

mod latent;
mod mlp;
mod vault;

pub use latent::LatentWorldModel;
pub use mlp::{Dense, NormedLinear};
pub use vault::ModelVault;

use ndarray::Array1;

/// Latent state vector.
pub type Latent = Array1<f32>;

/// Learned dynamics model queried during planning rollouts.
///
/// Implementations must be cheap to call repeatedly: `dynamics` and `reward`
/// sit in the planner's innermost loop.
pub trait WorldModel: Send + Sync {
    /// Latent state dimension.
    fn latent_dim(&self) -> usize;

    /// Action dimension.
    fn action_dim(&self) -> usize;

    /// Map a raw observation into latent space.
    fn encode(&self, observation: &Array1<f32>) -> Latent;

    /// Predict the next latent state.
    fn dynamics(&self, latent: &Latent, action: &Array1<f32>) -> Latent;

    /// Predict the scalar reward for taking `action` in `latent`.
    fn reward(&self, latent: &Latent, action: &Array1<f32>) -> f32;

    /// Predict the state value, averaged over the ensemble.
    fn value(&self, latent: &Latent) -> f32;

    /// Policy prior moments: `(mean, std)`, each of length `action_dim`.
    /// The mean lies in `[-1, 1]`; the std is bounded by the log-std squash.
    fn policy_moments(&self, latent: &Latent) -> (Array1<f32>, Array1<f32>);

    /// Probability that the episode continues past `latent`. Models without
    /// a continuation head return `None` and rollouts treat it as 1.
    fn continue_prob(&self, latent: &Latent) -> Option<f32> {
        let _ = latent;
        None
    }
}
