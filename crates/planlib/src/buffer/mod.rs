//! FIFO replay buffer with refresh-in-place value targets.
//!
//! Single-writer discipline: the orchestrator owns the buffer and hands out
//! `&mut` access to insertion and reanalysis in turn, so refreshes never
//! race with pushes. Index 0 is always the oldest stored transition.

use ndarray::Array1;
use rand::Rng;

/// One stored transition.
#[derive(Clone, Debug)]
pub struct ReplayEntry {
    pub observation: Array1<f32>,
    pub action: Array1<f32>,
    pub reward: f32,
    /// `false` when this step ended its episode.
    pub continued: bool,
    /// Bootstrapped value target. Seeded from the plan's expected return at
    /// insertion and refreshed in place by reanalysis.
    pub target_value: f32,
}

pub struct ReplayBuffer {
    entries: std::collections::VecDeque<ReplayEntry>,
    capacity: usize,
    evicted: u64,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: std::collections::VecDeque::with_capacity(capacity.min(1 << 20)),
            capacity,
            evicted: 0,
        }
    }

    /// Append a transition, evicting the oldest entry when full.
    pub fn push(&mut self, entry: ReplayEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of entries dropped by eviction since construction.
    pub fn total_evicted(&self) -> u64 {
        self.evicted
    }

    pub fn entry(&self, index: usize) -> Option<&ReplayEntry> {
        self.entries.get(index)
    }

    /// Overwrite one entry's value target. Returns `false` when the index
    /// is out of range.
    pub fn set_target_value(&mut self, index: usize, target: f32) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.target_value = target;
                true
            }
            None => false,
        }
    }

    /// Steps remaining in the episode that contains `start`, counting
    /// `start` itself and stopping after the first terminal step.
    pub fn episode_len_from(&self, start: usize) -> usize {
        let mut n = 0;
        for entry in self.entries.iter().skip(start) {
            n += 1;
            if !entry.continued {
                break;
            }
        }
        n
    }

    /// Uniform sample of entry indices, with replacement.
    pub fn sample_indices<R: Rng>(&self, batch: usize, rng: &mut R) -> Vec<usize> {
        (0..batch).map(|_| rng.gen_range(0..self.entries.len())).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplayEntry> {
        self.entries.iter()
    }
}
