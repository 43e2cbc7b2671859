//! Traits for the four external collaborators this crate does not own.
//!
//! These boundaries mirror the narrow, mockable collaborator traits used by
//! `kimberlite-directory` and `kimberlite-cluster`: each captures exactly the
//! operation the reconciler needs, nothing about how the collaborator is
//! implemented elsewhere in the cluster.

use std::time::Duration;

use crate::types::{FeatureUpdateCommand, GroupId, NodeId, NodeStatus, Term, Version};

/// Per-node health snapshot, queried fresh on every predicate evaluation.
///
/// Implementations may perform network I/O but are expected to usually
/// resolve from a cached snapshot, since this is called immediately after
/// cluster health has just changed.
pub trait HealthFrontend: Send + Sync {
    /// Returns the current liveness of every node the health monitor knows
    /// about. Failure is always treated as transient by the reconciler.
    fn get_nodes_status(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<NodeStatus>, String>> + Send;
}

/// Current cluster membership, as tracked by the members registry.
pub trait MembersRegistry: Send + Sync {
    /// Returns the current set of member node ids.
    fn all_broker_ids(&self) -> Vec<NodeId>;
}

/// Outcome of a consensus replicate-and-wait call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicateError {
    /// This node is no longer (or not yet) the consensus leader. The new
    /// leader is responsible for the next attempt.
    NotLeader,
    /// Any other failure. Treated as transient.
    Other(String),
}

/// The consensus log's replicate-and-wait surface.
pub trait ConsensusLog: Send + Sync {
    /// Replicates `command`, waiting up to `deadline` from now for the
    /// write to be durable and applied.
    fn replicate(
        &self,
        command: FeatureUpdateCommand,
        deadline: Duration,
    ) -> impl std::future::Future<Output = Result<(), ReplicateError>> + Send;
}

/// Read-mostly view of the replicated feature table.
///
/// The feature table itself applies the feature-update command; this core
/// only ever reads the result.
pub trait FeatureTable: Send + Sync {
    /// Returns the cluster-wide active version currently published.
    fn get_active_version(&self) -> Version;
}

/// Registration surface for per-node logical-version reports.
///
/// Mirrors the health-monitor backend's `register_node_callback`: the
/// callback is invoked with a node's newly reported logical version, and
/// the returned handle is passed back to `unregister_node_callback` during
/// shutdown so no report can reach a reconciler that has already stopped.
pub trait HealthNotifier: Send + Sync {
    type CallbackHandle: Send;

    fn register_node_callback(
        &self,
        callback: Box<dyn Fn(NodeId, Version) + Send + Sync>,
    ) -> Self::CallbackHandle;

    fn unregister_node_callback(&self, handle: Self::CallbackHandle);
}

/// Registration surface for consensus leadership-change notifications.
///
/// The callback receives the group whose leadership changed, the new term,
/// and the elected leader's node id, if any is currently elected.
pub trait LeadershipNotifier: Send + Sync {
    type CallbackHandle: Send;

    fn register_leadership_notification(
        &self,
        callback: Box<dyn Fn(GroupId, Term, Option<NodeId>) + Send + Sync>,
    ) -> Self::CallbackHandle;

    fn unregister_leadership_notification(&self, handle: Self::CallbackHandle);
}

impl<T: HealthNotifier + ?Sized> HealthNotifier for std::sync::Arc<T> {
    type CallbackHandle = T::CallbackHandle;

    fn register_node_callback(
        &self,
        callback: Box<dyn Fn(NodeId, Version) + Send + Sync>,
    ) -> Self::CallbackHandle {
        (**self).register_node_callback(callback)
    }

    fn unregister_node_callback(&self, handle: Self::CallbackHandle) {
        (**self).unregister_node_callback(handle);
    }
}

impl<T: LeadershipNotifier + ?Sized> LeadershipNotifier for std::sync::Arc<T> {
    type CallbackHandle = T::CallbackHandle;

    fn register_leadership_notification(
        &self,
        callback: Box<dyn Fn(GroupId, Term, Option<NodeId>) + Send + Sync>,
    ) -> Self::CallbackHandle {
        (**self).register_leadership_notification(callback)
    }

    fn unregister_leadership_notification(&self, handle: Self::CallbackHandle) {
        (**self).unregister_leadership_notification(handle);
    }
}

impl<T: HealthFrontend + ?Sized> HealthFrontend for std::sync::Arc<T> {
    fn get_nodes_status(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<NodeStatus>, String>> + Send {
        (**self).get_nodes_status()
    }
}

impl<T: MembersRegistry + ?Sized> MembersRegistry for std::sync::Arc<T> {
    fn all_broker_ids(&self) -> Vec<NodeId> {
        (**self).all_broker_ids()
    }
}

impl<T: ConsensusLog + ?Sized> ConsensusLog for std::sync::Arc<T> {
    fn replicate(
        &self,
        command: FeatureUpdateCommand,
        deadline: Duration,
    ) -> impl std::future::Future<Output = Result<(), ReplicateError>> + Send {
        (**self).replicate(command, deadline)
    }
}

impl<T: FeatureTable + ?Sized> FeatureTable for std::sync::Arc<T> {
    fn get_active_version(&self) -> Version {
        (**self).get_active_version()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! In-memory fakes for the four collaborator traits, used by this
    //! crate's own tests and available to downstream crates that want to
    //! exercise the manager without a real cluster.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::{
        ConsensusLog, FeatureTable, HealthFrontend, HealthNotifier, LeadershipNotifier,
        MembersRegistry, ReplicateError,
    };
    use crate::types::{FeatureUpdateCommand, GroupId, NodeId, NodeStatus, Term, Version};
    use std::time::Duration;

    /// A health frontend whose liveness table and "is this call broken"
    /// flag can be mutated from the test.
    #[derive(Default)]
    pub struct FakeHealthFrontend {
        state: Mutex<FakeHealthState>,
    }

    #[derive(Default)]
    struct FakeHealthState {
        liveness: HashMap<NodeId, bool>,
        fail_next: bool,
    }

    impl FakeHealthFrontend {
        pub fn set_alive(&self, node: NodeId, alive: bool) {
            self.state.lock().unwrap().liveness.insert(node, alive);
        }

        pub fn remove(&self, node: NodeId) {
            self.state.lock().unwrap().liveness.remove(&node);
        }

        pub fn fail_next_query(&self) {
            self.state.lock().unwrap().fail_next = true;
        }
    }

    impl HealthFrontend for FakeHealthFrontend {
        async fn get_nodes_status(&self) -> Result<Vec<NodeStatus>, String> {
            let mut state = self.state.lock().unwrap();
            if std::mem::take(&mut state.fail_next) {
                return Err("simulated health query failure".to_string());
            }
            Ok(state
                .liveness
                .iter()
                .map(|(&node, &is_alive)| NodeStatus { node, is_alive })
                .collect())
        }
    }

    /// Fixed membership snapshot.
    pub struct FakeMembersRegistry {
        members: Mutex<Vec<NodeId>>,
    }

    impl FakeMembersRegistry {
        pub fn new(members: Vec<NodeId>) -> Self {
            Self {
                members: Mutex::new(members),
            }
        }

        pub fn set_members(&self, members: Vec<NodeId>) {
            *self.members.lock().unwrap() = members;
        }
    }

    impl MembersRegistry for FakeMembersRegistry {
        fn all_broker_ids(&self) -> Vec<NodeId> {
            self.members.lock().unwrap().clone()
        }
    }

    /// A consensus log that records every committed command and can be
    /// told to reject the next write as `not_leader` or any other error.
    #[derive(Default)]
    pub struct FakeConsensusLog {
        state: Mutex<FakeConsensusState>,
    }

    #[derive(Default)]
    struct FakeConsensusState {
        committed: Vec<FeatureUpdateCommand>,
        next_result: Option<ReplicateError>,
    }

    impl FakeConsensusLog {
        pub fn reject_next_as_not_leader(&self) {
            self.state.lock().unwrap().next_result = Some(ReplicateError::NotLeader);
        }

        pub fn reject_next_with(&self, reason: impl Into<String>) {
            self.state.lock().unwrap().next_result = Some(ReplicateError::Other(reason.into()));
        }

        pub fn committed(&self) -> Vec<FeatureUpdateCommand> {
            self.state.lock().unwrap().committed.clone()
        }
    }

    impl ConsensusLog for FakeConsensusLog {
        async fn replicate(
            &self,
            command: FeatureUpdateCommand,
            _deadline: Duration,
        ) -> Result<(), ReplicateError> {
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.next_result.take() {
                return Err(err);
            }
            state.committed.push(command);
            Ok(())
        }
    }

    /// The feature table's active version, updated directly by the test to
    /// simulate the state machine applying a committed command.
    pub struct FakeFeatureTable {
        active_version: Mutex<Version>,
    }

    impl FakeFeatureTable {
        pub fn new(initial: Version) -> Self {
            Self {
                active_version: Mutex::new(initial),
            }
        }

        pub fn set_active_version(&self, version: Version) {
            *self.active_version.lock().unwrap() = version;
        }
    }

    impl FeatureTable for FakeFeatureTable {
        fn get_active_version(&self) -> Version {
            *self.active_version.lock().unwrap()
        }
    }

    /// A health notifier holding at most one registered callback, which
    /// tests trigger directly with `fire_node_report`.
    #[derive(Default)]
    pub struct FakeHealthNotifier {
        callback: Mutex<Option<Box<dyn Fn(NodeId, Version) + Send + Sync>>>,
    }

    impl FakeHealthNotifier {
        pub fn fire_node_report(&self, node: NodeId, version: Version) {
            if let Some(callback) = self.callback.lock().unwrap().as_ref() {
                callback(node, version);
            }
        }

        pub fn is_registered(&self) -> bool {
            self.callback.lock().unwrap().is_some()
        }
    }

    impl HealthNotifier for FakeHealthNotifier {
        type CallbackHandle = ();

        fn register_node_callback(
            &self,
            callback: Box<dyn Fn(NodeId, Version) + Send + Sync>,
        ) -> Self::CallbackHandle {
            *self.callback.lock().unwrap() = Some(callback);
        }

        fn unregister_node_callback(&self, _handle: Self::CallbackHandle) {
            *self.callback.lock().unwrap() = None;
        }
    }

    /// A leadership notifier holding at most one registered callback, which
    /// tests trigger directly with `fire_leadership_change`.
    #[derive(Default)]
    pub struct FakeLeadershipNotifier {
        callback: Mutex<Option<Box<dyn Fn(GroupId, Term, Option<NodeId>) + Send + Sync>>>,
    }

    impl FakeLeadershipNotifier {
        pub fn fire_leadership_change(&self, group: GroupId, term: Term, leader_id: Option<NodeId>) {
            if let Some(callback) = self.callback.lock().unwrap().as_ref() {
                callback(group, term, leader_id);
            }
        }

        pub fn is_registered(&self) -> bool {
            self.callback.lock().unwrap().is_some()
        }
    }

    impl LeadershipNotifier for FakeLeadershipNotifier {
        type CallbackHandle = ();

        fn register_leadership_notification(
            &self,
            callback: Box<dyn Fn(GroupId, Term, Option<NodeId>) + Send + Sync>,
        ) -> Self::CallbackHandle {
            *self.callback.lock().unwrap() = Some(callback);
        }

        fn unregister_leadership_notification(&self, _handle: Self::CallbackHandle) {
            *self.callback.lock().unwrap() = None;
        }
    }
}
