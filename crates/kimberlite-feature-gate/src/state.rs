//! The registry/queue/leader-flag triple, guarded by one mutex.
//!
//! The source this crate is modeled on runs each shard single-threaded, so
//! the registry, queue, and leader flag need no synchronization at all.
//! Tokio's default runtime has no such guarantee, so this crate guards all
//! three with a single `std::sync::Mutex` rather than introducing
//! finer-grained locking — the predicate must see a consistent snapshot of
//! all three together (see DESIGN.md).

use std::sync::Mutex;

use crate::queue::UpdateQueue;
use crate::registry::VersionRegistry;
use crate::types::Observation;

#[derive(Debug, Default)]
struct Inner {
    registry: VersionRegistry,
    queue: UpdateQueue,
    is_leader: bool,
}

/// Shared mutable state for the registry, pending-update queue, and leader
/// flag. Cheap to construct; intended to live behind an `Arc`.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<Inner>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observation to the pending queue. Called by notification
    /// adapters; does not touch the registry.
    pub fn push_observation(&self, observation: Observation) {
        self.inner.lock().unwrap().queue.push(observation);
    }

    /// Sets the leader flag. Called only by the leadership adapter.
    pub fn set_leader(&self, is_leader: bool) {
        self.inner.lock().unwrap().is_leader = is_leader;
    }

    pub fn is_leader(&self) -> bool {
        self.inner.lock().unwrap().is_leader
    }

    /// True if there is at least one observation pending. Used as the wake
    /// signal's predicate.
    pub fn has_pending(&self) -> bool {
        !self.inner.lock().unwrap().queue.is_empty()
    }

    /// Drains the pending queue into the registry (last-writer-wins per
    /// node) and returns the resulting maximum version across the registry.
    ///
    /// This is the only place the registry is mutated, matching the
    /// invariant that the reconciler is the registry's sole writer.
    pub fn fold_and_max_version(&self) -> crate::types::Version {
        let mut inner = self.inner.lock().unwrap();
        let drained = inner.queue.drain();
        for observation in drained {
            inner.registry.set(observation.node, observation.version);
        }
        inner.registry.max_version()
    }

    /// Snapshot of the registry for logging or inspection.
    pub fn registry_snapshot(&self) -> Vec<(crate::types::NodeId, crate::types::Version)> {
        self.inner.lock().unwrap().registry.iter().collect()
    }

    /// Returns the last-reported version for `node`, if any.
    pub fn get_version(&self, node: crate::types::NodeId) -> Option<crate::types::Version> {
        self.inner.lock().unwrap().registry.get(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeId, Observation, Version};

    #[test]
    fn fold_applies_last_writer_wins() {
        let state = SharedState::new();
        state.push_observation(Observation::new(NodeId::new(1), Version::new(1)));
        state.push_observation(Observation::new(NodeId::new(1), Version::new(2)));
        let max = state.fold_and_max_version();
        assert_eq!(max, Version::new(2));
        assert_eq!(state.get_version(NodeId::new(1)), Some(Version::new(2)));
    }

    #[test]
    fn fold_on_empty_queue_preserves_registry_max() {
        let state = SharedState::new();
        state.push_observation(Observation::new(NodeId::new(1), Version::new(5)));
        state.fold_and_max_version();
        // Second fold with nothing new pending should reproduce the same max.
        assert_eq!(state.fold_and_max_version(), Version::new(5));
    }

    #[test]
    fn has_pending_reflects_queue_state() {
        let state = SharedState::new();
        assert!(!state.has_pending());
        state.push_observation(Observation::new(NodeId::new(1), Version::new(1)));
        assert!(state.has_pending());
        state.fold_and_max_version();
        assert!(!state.has_pending());
    }

    #[test]
    fn leader_flag_defaults_false() {
        let state = SharedState::new();
        assert!(!state.is_leader());
        state.set_leader(true);
        assert!(state.is_leader());
    }
}
