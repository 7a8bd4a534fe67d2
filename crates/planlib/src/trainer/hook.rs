//! Seam between the collection loop and an external optimizer.
//!
//! The orchestrator owns scheduling (update-to-data budget, policy update
//! interval, checkpoints) and calls into a hook at the granted points. A
//! hook that returns a replacement model gets it published to the vault;
//! returning `None` leaves the current version in place. Gradient-based
//! training lives behind this trait, outside the crate.

use crate::buffer::ReplayBuffer;
use crate::model::WorldModel;

pub trait UpdateHook<M: WorldModel>: Send {
    /// One granted model-update invocation. `model` is the latest published
    /// snapshot; `buffer` is the replay data collected so far.
    fn update_model(&mut self, model: &M, buffer: &ReplayBuffer, step: u64) -> Option<M>;

    /// Called on the policy update schedule. The policy prior lives inside
    /// the model, so an updated policy is also published as a whole model.
    fn update_policy(&mut self, model: &M, buffer: &ReplayBuffer, step: u64) -> Option<M> {
        let _ = (model, buffer, step);
        None
    }

    /// Called on the save schedule with the latest published model.
    fn save(&mut self, model: &M, step: u64) {
        let _ = (model, step);
    }
}

/// Collect-only hook: never updates, never saves.
pub struct NoOpHook;

impl<M: WorldModel> UpdateHook<M> for NoOpHook {
    fn update_model(&mut self, _model: &M, _buffer: &ReplayBuffer, _step: u64) -> Option<M> {
        None
    }
}
