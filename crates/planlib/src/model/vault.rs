//! Versioned snapshot store for model parameters.
//!
//! The trainer publishes whole replacement models; planners take an `Arc`
//! snapshot once per planning call and never hold the lock while rolling
//! out. A snapshot taken before a publish stays valid and unchanged for as
//! long as the caller keeps it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub struct ModelVault<M> {
    current: RwLock<Arc<M>>,
    version: AtomicU64,
}

impl<M> ModelVault<M> {
    /// Wrap an initial model at version 0.
    pub fn new(model: M) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
            version: AtomicU64::new(0),
        }
    }

    /// Cheap handle to the latest published model.
    pub fn snapshot(&self) -> Arc<M> {
        self.current.read().unwrap().clone()
    }

    /// Swap in a replacement model and return its version number.
    pub fn publish(&self, model: M) -> u64 {
        let mut slot = self.current.write().unwrap();
        *slot = Arc::new(model);
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Version of the latest published model. Starts at 0, bumps once per
    /// publish, never repeats or reorders.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
