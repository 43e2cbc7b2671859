//! The background reconciliation loop.

use std::sync::Arc;

use crate::collaborators::{ConsensusLog, FeatureTable, HealthFrontend, MembersRegistry};
use crate::config::FeatureGateConfig;
use crate::error::Outcome;
use crate::predicate::advance_once;
use crate::state::SharedState;
use crate::wake::{WaitOutcome, WakeSignal};

/// Runs until `wake` is broken, evaluating the advance predicate whenever
/// woken and backing off on transient failure.
///
/// Spawned as its own task by [`crate::manager::FeatureGateManager::start`];
/// exits (rather than panicking) on any transient error by simply retrying
/// after `retry_interval`, matching the "retry forever" policy of the
/// component this reconciles state for.
pub async fn run<H, M, C, F>(
    state: Arc<SharedState>,
    wake: Arc<WakeSignal>,
    config: FeatureGateConfig,
    health: H,
    members: M,
    consensus: C,
    feature_table: F,
) where
    H: HealthFrontend,
    M: MembersRegistry,
    C: ConsensusLog,
    F: FeatureTable,
{
    loop {
        if wake.is_broken() {
            tracing::debug!("wake signal broken, exiting reconciler loop");
            return;
        }

        if !state.is_leader() {
            match wake.wait(|| state.is_leader()).await {
                WaitOutcome::Broken => return,
                WaitOutcome::Signaled => continue,
            }
        }

        match advance_once(&state, &config, &health, &members, &consensus, &feature_table).await {
            Outcome::Advance(_) | Outcome::Defer => {
                match wake.wait(|| state.has_pending()).await {
                    WaitOutcome::Broken => return,
                    WaitOutcome::Signaled => continue,
                }
            }
            Outcome::Transient(error) => {
                tracing::warn!(%error, "transient error evaluating advance predicate, retrying");
                tokio::select! {
                    () = tokio::time::sleep(config.retry_interval) => {}
                    () = wait_for_break(&wake) => return,
                }
            }
        }
    }
}

async fn wait_for_break(wake: &WakeSignal) {
    // A broken signal is terminal, so polling the predicate `is_broken`
    // through `wait` is sufficient: it returns immediately once broken and
    // otherwise parks until `brk()` is called.
    wake.wait(|| false).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::test_support::{
        FakeConsensusLog, FakeFeatureTable, FakeHealthFrontend, FakeMembersRegistry,
    };
    use crate::types::{NodeId, Observation, Version};
    use std::time::Duration;

    #[tokio::test]
    async fn advances_once_all_nodes_report_and_exits_on_break() {
        let state = Arc::new(SharedState::new());
        let wake = Arc::new(WakeSignal::new());
        let mut config = FeatureGateConfig::default();
        config.retry_interval = Duration::from_millis(10);

        let health = FakeHealthFrontend::default();
        health.set_alive(NodeId::new(1), true);
        let members = FakeMembersRegistry::new(vec![NodeId::new(1)]);
        let consensus = FakeConsensusLog::default();
        let table = FakeFeatureTable::new(Version::new(0));

        state.set_leader(true);
        state.push_observation(Observation::new(NodeId::new(1), Version::new(1)));

        let handle = tokio::spawn(run(
            Arc::clone(&state),
            Arc::clone(&wake),
            config,
            health,
            members,
            consensus,
            table,
        ));

        // Give the loop a chance to run the predicate once.
        tokio::time::sleep(Duration::from_millis(20)).await;
        wake.brk();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn non_leader_waits_without_evaluating_predicate() {
        let state = Arc::new(SharedState::new());
        let wake = Arc::new(WakeSignal::new());
        let config = FeatureGateConfig::default();

        let health = FakeHealthFrontend::default();
        let members = FakeMembersRegistry::new(vec![]);
        let consensus = FakeConsensusLog::default();
        let table = FakeFeatureTable::new(Version::new(0));

        // Not leader, so pushing an observation must not cause a publish.
        state.push_observation(Observation::new(NodeId::new(1), Version::new(1)));

        let handle = tokio::spawn(run(
            Arc::clone(&state),
            Arc::clone(&wake),
            config,
            health,
            members,
            consensus,
            table,
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(state.has_pending(), "observation must remain unfolded while not leader");
        wake.brk();
        handle.await.unwrap();
    }
}
