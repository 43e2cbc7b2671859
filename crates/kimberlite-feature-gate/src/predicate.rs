//! The advance predicate: decides whether the active version should move,
//! and performs the publication when it does.

use std::collections::HashMap;

use crate::collaborators::{ConsensusLog, FeatureTable, HealthFrontend, MembersRegistry, ReplicateError};
use crate::config::FeatureGateConfig;
use crate::error::{Error, Outcome};
use crate::state::SharedState;
use crate::types::FeatureUpdateCommand;

/// Runs one evaluation of the advance predicate, publishing through
/// `consensus` if every condition is met.
///
/// Only called when the leader flag is true; callers check that first so
/// this function can assume it (see [`crate::reconciler`]).
pub async fn advance_once<H, M, C, F>(
    state: &SharedState,
    config: &FeatureGateConfig,
    health: &H,
    members: &M,
    consensus: &C,
    feature_table: &F,
) -> Outcome
where
    H: HealthFrontend,
    M: MembersRegistry,
    C: ConsensusLog,
    F: FeatureTable,
{
    // Fold pending observations into the registry and compute the
    // candidate version.
    let candidate = state.fold_and_max_version();

    let active_version = feature_table.get_active_version();
    if candidate <= active_version {
        tracing::debug!(
            %candidate,
            %active_version,
            "no update, candidate not ahead of active version"
        );
        return Outcome::Defer;
    }

    let node_status = match health.get_nodes_status().await {
        Ok(status) => status,
        Err(reason) => return Outcome::Transient(Error::HealthQueryFailed(reason)),
    };
    let liveness: HashMap<_, _> = node_status.into_iter().map(|s| (s.node, s.is_alive)).collect();

    for member in members.all_broker_ids() {
        match state.get_version(member) {
            None => {
                tracing::debug!(node = %member, %candidate, "version unknown, deferring");
                return Outcome::Defer;
            }
            Some(version) if version < candidate => {
                tracing::debug!(node = %member, %version, %candidate, "version too low, deferring");
                return Outcome::Defer;
            }
            Some(_) => {}
        }

        match liveness.get(&member) {
            None => return Outcome::Transient(Error::MissingLiveness(member)),
            Some(false) => return Outcome::Transient(Error::NodeDown(member)),
            Some(true) => {}
        }
    }

    let command = FeatureUpdateCommand::new(candidate);
    match consensus.replicate(command, config.retry_interval).await {
        Ok(()) => {
            for (node, version) in state.registry_snapshot() {
                tracing::info!(%node, %version, "node logical version");
            }
            tracing::info!(%candidate, "updated cluster version");
            Outcome::Advance(candidate)
        }
        Err(ReplicateError::NotLeader) => {
            tracing::debug!("lost leadership during publish, new leader will retry");
            Outcome::Defer
        }
        Err(ReplicateError::Other(reason)) => {
            Outcome::Transient(Error::ReplicateFailed(candidate, reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::test_support::{
        FakeConsensusLog, FakeFeatureTable, FakeHealthFrontend, FakeMembersRegistry,
    };
    use crate::types::{NodeId, Observation, Version};

    fn setup(members: Vec<NodeId>, active: Version) -> (
        SharedState,
        FeatureGateConfig,
        FakeHealthFrontend,
        FakeMembersRegistry,
        FakeConsensusLog,
        FakeFeatureTable,
    ) {
        (
            SharedState::new(),
            FeatureGateConfig::default(),
            FakeHealthFrontend::default(),
            FakeMembersRegistry::new(members),
            FakeConsensusLog::default(),
            FakeFeatureTable::new(active),
        )
    }

    #[tokio::test]
    async fn candidate_not_ahead_of_active_is_a_noop() {
        let (state, config, health, members, consensus, table) =
            setup(vec![NodeId::new(1)], Version::new(10));
        state.push_observation(Observation::new(NodeId::new(1), Version::new(10)));

        let outcome = advance_once(&state, &config, &health, &members, &consensus, &table).await;
        assert!(matches!(outcome, Outcome::Defer));
        assert!(consensus.committed().is_empty());
    }

    #[tokio::test]
    async fn unknown_member_version_defers() {
        let (state, config, health, members, consensus, table) =
            setup(vec![NodeId::new(1), NodeId::new(2)], Version::new(10));
        state.push_observation(Observation::new(NodeId::new(1), Version::new(11)));
        health.set_alive(NodeId::new(1), true);
        health.set_alive(NodeId::new(2), true);

        let outcome = advance_once(&state, &config, &health, &members, &consensus, &table).await;
        assert!(matches!(outcome, Outcome::Defer));
        assert!(consensus.committed().is_empty());
    }

    #[tokio::test]
    async fn dead_member_is_transient() {
        let (state, config, health, members, consensus, table) =
            setup(vec![NodeId::new(1), NodeId::new(2)], Version::new(10));
        state.push_observation(Observation::new(NodeId::new(1), Version::new(11)));
        state.push_observation(Observation::new(NodeId::new(2), Version::new(11)));
        health.set_alive(NodeId::new(1), true);
        health.set_alive(NodeId::new(2), false);

        let outcome = advance_once(&state, &config, &health, &members, &consensus, &table).await;
        assert!(matches!(outcome, Outcome::Transient(Error::NodeDown(n)) if n == NodeId::new(2)));
    }

    #[tokio::test]
    async fn missing_liveness_is_transient() {
        let (state, config, health, members, consensus, table) =
            setup(vec![NodeId::new(1), NodeId::new(2)], Version::new(10));
        state.push_observation(Observation::new(NodeId::new(1), Version::new(11)));
        state.push_observation(Observation::new(NodeId::new(2), Version::new(11)));
        health.set_alive(NodeId::new(1), true);
        // node 2 has no liveness record at all.

        let outcome = advance_once(&state, &config, &health, &members, &consensus, &table).await;
        assert!(matches!(outcome, Outcome::Transient(Error::MissingLiveness(n)) if n == NodeId::new(2)));
    }

    #[tokio::test]
    async fn health_query_failure_is_transient() {
        let (state, config, health, members, consensus, table) =
            setup(vec![NodeId::new(1)], Version::new(10));
        state.push_observation(Observation::new(NodeId::new(1), Version::new(11)));
        health.fail_next_query();

        let outcome = advance_once(&state, &config, &health, &members, &consensus, &table).await;
        assert!(matches!(outcome, Outcome::Transient(Error::HealthQueryFailed(_))));
    }

    #[tokio::test]
    async fn all_conditions_met_publishes_and_advances() {
        let (state, config, health, members, consensus, table) =
            setup(vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)], Version::new(10));
        for n in [1, 2, 3] {
            state.push_observation(Observation::new(NodeId::new(n), Version::new(11)));
            health.set_alive(NodeId::new(n), true);
        }

        let outcome = advance_once(&state, &config, &health, &members, &consensus, &table).await;
        assert!(matches!(outcome, Outcome::Advance(v) if v == Version::new(11)));
        assert_eq!(consensus.committed().len(), 1);
        assert_eq!(consensus.committed()[0].logical_version, Version::new(11));
    }

    #[tokio::test]
    async fn not_leader_on_publish_is_a_silent_defer() {
        let (state, config, health, members, consensus, table) =
            setup(vec![NodeId::new(1)], Version::new(10));
        state.push_observation(Observation::new(NodeId::new(1), Version::new(11)));
        health.set_alive(NodeId::new(1), true);
        consensus.reject_next_as_not_leader();

        let outcome = advance_once(&state, &config, &health, &members, &consensus, &table).await;
        assert!(matches!(outcome, Outcome::Defer));
    }

    #[tokio::test]
    async fn other_replicate_error_is_transient() {
        let (state, config, health, members, consensus, table) =
            setup(vec![NodeId::new(1)], Version::new(10));
        state.push_observation(Observation::new(NodeId::new(1), Version::new(11)));
        health.set_alive(NodeId::new(1), true);
        consensus.reject_next_with("raft0 unavailable");

        let outcome = advance_once(&state, &config, &health, &members, &consensus, &table).await;
        assert!(matches!(outcome, Outcome::Transient(Error::ReplicateFailed(..))));
    }

    #[tokio::test]
    async fn non_member_registry_entries_are_ignored() {
        let (state, config, health, members, consensus, table) =
            setup(vec![NodeId::new(1)], Version::new(10));
        state.push_observation(Observation::new(NodeId::new(1), Version::new(11)));
        // node 99 is not a member; its low version must not block publication.
        state.push_observation(Observation::new(NodeId::new(99), Version::new(0)));
        health.set_alive(NodeId::new(1), true);

        let outcome = advance_once(&state, &config, &health, &members, &consensus, &table).await;
        assert!(matches!(outcome, Outcome::Advance(v) if v == Version::new(11)));
    }
}
