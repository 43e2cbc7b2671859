//! Notification adapters: translate external callbacks into queue pushes,
//! leader-flag flips, and wake signals.
//!
//! Both adapters share one `FeatureGateHandle`, cloned cheaply (every field
//! is an `Arc`) into the closures `FeatureGateManager::start` registers
//! with the embedding cluster's health and leadership notifiers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::collaborators::FeatureTable;
use crate::state::SharedState;
use crate::types::{GroupId, NodeId, NodeStatus, Observation, Term, Version};
use crate::wake::WakeSignal;

/// Shared handle into the reconciler's state and wake signal.
///
/// Cheap to clone; every notification callback gets its own clone rather
/// than a borrow, since callbacks are typically registered once and invoked
/// from arbitrary tasks for the lifetime of the manager.
#[derive(Clone)]
pub struct FeatureGateHandle {
    state: Arc<SharedState>,
    wake: Arc<WakeSignal>,
    last_delivered: Arc<Mutex<HashMap<NodeId, Version>>>,
}

impl FeatureGateHandle {
    pub(crate) fn new(state: Arc<SharedState>, wake: Arc<WakeSignal>) -> Self {
        Self {
            state,
            wake,
            last_delivered: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn state(&self) -> &SharedState {
        &self.state
    }

    pub(crate) fn wake(&self) -> &WakeSignal {
        &self.wake
    }

    /// Feeds a single node's version report, as it would arrive from the
    /// health monitor's per-node update callback.
    ///
    /// Only enqueued if the reported version actually changed since the
    /// last report *delivered to this adapter* — tracked independently of
    /// the reconciler-owned registry, which is only written while this node
    /// is leader (see `state::SharedState::fold_and_max_version`). Comparing
    /// against the registry instead would mean the edge filter never
    /// suppresses anything on the N-1 non-leader replicas, where the
    /// registry is permanently empty. This mirrors `old_report` in the
    /// health-monitor backend this adapter is modeled on, which lives
    /// outside the reconciled state for the same reason.
    pub fn on_node_version_report(&self, node: NodeId, version: Version) {
        let mut last_delivered = self.last_delivered.lock().unwrap();
        if last_delivered.get(&node) != Some(&version) {
            last_delivered.insert(node, version);
            drop(last_delivered);
            self.state.push_observation(Observation::new(node, version));
            self.wake.signal();
        }
    }

    /// Feeds a leadership-change notification. Notifications for any group
    /// other than `controller_group_id` are ignored.
    ///
    /// When this node becomes the leader of the controller group and the
    /// feature table has not yet reached [`crate::LATEST`], this injects a
    /// self-observation at the latest version so a freshly-elected leader
    /// doesn't wait for its own next health report before considering an
    /// advance — this is how a single-node cluster bootstraps to its
    /// initial active version with no other node ever reporting in.
    pub fn on_leadership_change<F: FeatureTable>(
        &self,
        controller_group_id: GroupId,
        group: GroupId,
        term: Term,
        is_leader: bool,
        self_node: NodeId,
        feature_table: &F,
    ) {
        if group != controller_group_id {
            return;
        }
        tracing::info!(%group, %term, is_leader, "controller leadership changed");
        self.state.set_leader(is_leader);
        if is_leader && feature_table.get_active_version() != crate::LATEST {
            self.state
                .push_observation(Observation::new(self_node, crate::LATEST));
        }
        self.wake.signal();
    }

    pub fn is_leader(&self) -> bool {
        self.state.is_leader()
    }
}
