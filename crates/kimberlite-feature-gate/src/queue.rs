//! Append-only buffer of pending observations handed to the reconciler.
//!
//! This type carries no synchronization of its own: it is always accessed
//! through the shared mutex in [`crate::state`], the same way the registry
//! and leader flag are. See DESIGN.md for why this crate does not rely on a
//! lock-free single-writer/single-reader discipline.

use crate::types::Observation;

/// Pending `(node, version)` observations, consumed wholesale by the
/// reconciler on each wake.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    pending: Vec<Observation>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observation. Called by notification adapters.
    pub fn push(&mut self, observation: Observation) {
        self.pending.push(observation);
    }

    /// Atomically takes every pending observation, leaving the queue empty.
    /// Ordering of the returned sequence is not meaningful: the reconciler
    /// folds it into the registry with last-writer-wins semantics.
    pub fn drain(&mut self) -> Vec<Observation> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
