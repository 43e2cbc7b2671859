//! End-to-end scenarios driven through the public `FeatureGateManager` API
//! and the in-memory `test_support` fakes, rather than the crate's internal
//! `advance_once`/`SharedState` surfaces exercised by the unit tests.
//!
//! S1-S6 below correspond to the concrete scenarios in the specification
//! this component implements: a three-node rolling upgrade, a dead node
//! blocking the advance, partial reporting, a leadership handoff mid-flight,
//! a cold single-node cluster bootstrapping without any health report, and
//! a shutdown that interrupts a transient-error retry loop.
//!
//! Every scenario drives the manager through the registered
//! `FakeHealthNotifier`/`FakeLeadershipNotifier` rather than calling
//! `FeatureGateHandle` directly, so these tests exercise the same
//! register/unregister wiring a real health monitor and consensus module
//! would go through.

use std::sync::Arc;
use std::time::Duration;

use kimberlite_feature_gate::collaborators::test_support::{
    FakeConsensusLog, FakeFeatureTable, FakeHealthFrontend, FakeHealthNotifier,
    FakeLeadershipNotifier, FakeMembersRegistry,
};
use kimberlite_feature_gate::config::FeatureGateConfig;
use kimberlite_feature_gate::manager::FeatureGateManager;
use kimberlite_feature_gate::types::{GroupId, NodeId, Term, Version};
use kimberlite_feature_gate::LATEST;

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition did not become true in time");
}

fn short_retry_config(self_node_id: NodeId) -> FeatureGateConfig {
    let mut config = FeatureGateConfig::default();
    config.retry_interval = Duration::from_millis(20);
    config.self_node_id = self_node_id;
    config
}

/// S1: three nodes each report version 2; once the last one reports, the
/// active version advances to 2.
#[tokio::test]
async fn s1_three_node_upgrade_advances_once_all_report() {
    let mut manager = FeatureGateManager::new(short_retry_config(NodeId::new(1)));
    let health_notifier = Arc::new(FakeHealthNotifier::default());
    let leadership_notifier = Arc::new(FakeLeadershipNotifier::default());
    let health = Arc::new(FakeHealthFrontend::default());
    let members = Arc::new(FakeMembersRegistry::new(vec![
        NodeId::new(1),
        NodeId::new(2),
        NodeId::new(3),
    ]));
    let consensus = Arc::new(FakeConsensusLog::default());
    let table = Arc::new(FakeFeatureTable::new(Version::new(1)));
    for n in [1, 2, 3] {
        health.set_alive(NodeId::new(n), true);
    }

    manager.start(
        Arc::clone(&health_notifier),
        Arc::clone(&leadership_notifier),
        Arc::clone(&health),
        Arc::clone(&members),
        Arc::clone(&consensus),
        Arc::clone(&table),
    );
    leadership_notifier.fire_leadership_change(GroupId::new(0), Term::new(1), Some(NodeId::new(1)));

    health_notifier.fire_node_report(NodeId::new(1), Version::new(2));
    health_notifier.fire_node_report(NodeId::new(2), Version::new(2));
    assert!(consensus.committed().is_empty(), "must not advance with node 3 unreported");

    health_notifier.fire_node_report(NodeId::new(3), Version::new(2));
    wait_until(|| !consensus.committed().is_empty()).await;

    assert_eq!(consensus.committed().len(), 1);
    assert_eq!(consensus.committed()[0].logical_version, Version::new(2));
    manager.stop().await;
}

/// S2: one node is down; the advance is blocked even though every node has
/// reported the new version.
#[tokio::test]
async fn s2_dead_node_blocks_advance() {
    let mut manager = FeatureGateManager::new(short_retry_config(NodeId::new(1)));
    let health_notifier = Arc::new(FakeHealthNotifier::default());
    let leadership_notifier = Arc::new(FakeLeadershipNotifier::default());
    let health = Arc::new(FakeHealthFrontend::default());
    let members = Arc::new(FakeMembersRegistry::new(vec![NodeId::new(1), NodeId::new(2)]));
    let consensus = Arc::new(FakeConsensusLog::default());
    let table = Arc::new(FakeFeatureTable::new(Version::new(1)));
    health.set_alive(NodeId::new(1), true);
    health.set_alive(NodeId::new(2), false);

    manager.start(
        Arc::clone(&health_notifier),
        Arc::clone(&leadership_notifier),
        Arc::clone(&health),
        Arc::clone(&members),
        Arc::clone(&consensus),
        Arc::clone(&table),
    );
    leadership_notifier.fire_leadership_change(GroupId::new(0), Term::new(1), Some(NodeId::new(1)));
    health_notifier.fire_node_report(NodeId::new(1), Version::new(2));
    health_notifier.fire_node_report(NodeId::new(2), Version::new(2));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(consensus.committed().is_empty(), "dead node must block the advance");
    manager.stop().await;
}

/// S3: only a subset of members have reported; the registry remembers the
/// reporters but the predicate defers until the rest catch up.
#[tokio::test]
async fn s3_partial_reporting_defers() {
    let mut manager = FeatureGateManager::new(short_retry_config(NodeId::new(1)));
    let health_notifier = Arc::new(FakeHealthNotifier::default());
    let leadership_notifier = Arc::new(FakeLeadershipNotifier::default());
    let health = Arc::new(FakeHealthFrontend::default());
    let members = Arc::new(FakeMembersRegistry::new(vec![
        NodeId::new(1),
        NodeId::new(2),
        NodeId::new(3),
    ]));
    let consensus = Arc::new(FakeConsensusLog::default());
    let table = Arc::new(FakeFeatureTable::new(Version::new(1)));
    for n in [1, 2, 3] {
        health.set_alive(NodeId::new(n), true);
    }

    manager.start(
        Arc::clone(&health_notifier),
        Arc::clone(&leadership_notifier),
        Arc::clone(&health),
        Arc::clone(&members),
        Arc::clone(&consensus),
        Arc::clone(&table),
    );
    leadership_notifier.fire_leadership_change(GroupId::new(0), Term::new(1), Some(NodeId::new(1)));
    health_notifier.fire_node_report(NodeId::new(1), Version::new(2));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(consensus.committed().is_empty());

    health_notifier.fire_node_report(NodeId::new(2), Version::new(2));
    health_notifier.fire_node_report(NodeId::new(3), Version::new(2));
    wait_until(|| !consensus.committed().is_empty()).await;
    assert_eq!(consensus.committed()[0].logical_version, Version::new(2));
    manager.stop().await;
}

/// S4: leadership moves to a second manager instance mid-flight; only the
/// current leader's reconciler is allowed to publish.
#[tokio::test]
async fn s4_leadership_handoff() {
    let group = GroupId::new(0);
    let table = Arc::new(FakeFeatureTable::new(Version::new(1)));
    let consensus = Arc::new(FakeConsensusLog::default());
    let members = Arc::new(FakeMembersRegistry::new(vec![NodeId::new(1)]));
    let health = Arc::new(FakeHealthFrontend::default());
    health.set_alive(NodeId::new(1), true);

    let mut former_leader = FeatureGateManager::new(short_retry_config(NodeId::new(1)));
    let former_health_notifier = Arc::new(FakeHealthNotifier::default());
    let former_leadership_notifier = Arc::new(FakeLeadershipNotifier::default());
    former_leader.start(
        Arc::clone(&former_health_notifier),
        Arc::clone(&former_leadership_notifier),
        Arc::clone(&health),
        Arc::clone(&members),
        Arc::clone(&consensus),
        Arc::clone(&table),
    );
    former_leadership_notifier.fire_leadership_change(group, Term::new(1), Some(NodeId::new(1)));
    assert!(former_leader.is_leader());

    // Lose leadership before the node catches up to the candidate version.
    former_leadership_notifier.fire_leadership_change(group, Term::new(2), None);
    assert!(!former_leader.is_leader());

    let mut new_leader = FeatureGateManager::new(short_retry_config(NodeId::new(1)));
    let new_health_notifier = Arc::new(FakeHealthNotifier::default());
    let new_leadership_notifier = Arc::new(FakeLeadershipNotifier::default());
    new_leader.start(
        Arc::clone(&new_health_notifier),
        Arc::clone(&new_leadership_notifier),
        health,
        members,
        Arc::clone(&consensus),
        Arc::clone(&table),
    );
    new_leadership_notifier.fire_leadership_change(group, Term::new(2), Some(NodeId::new(1)));
    new_health_notifier.fire_node_report(NodeId::new(1), Version::new(2));

    wait_until(|| !consensus.committed().is_empty()).await;
    assert_eq!(consensus.committed()[0].logical_version, Version::new(2));

    former_leader.stop().await;
    new_leader.stop().await;
}

/// S5: a single-node cluster becomes leader with the feature table already
/// behind `LATEST`; the node self-injects and advances with no health
/// report ever arriving.
#[tokio::test]
async fn s5_cold_single_node_cluster_bootstraps() {
    let mut manager = FeatureGateManager::new(short_retry_config(NodeId::new(1)));
    let health_notifier = Arc::new(FakeHealthNotifier::default());
    let leadership_notifier = Arc::new(FakeLeadershipNotifier::default());
    let health = Arc::new(FakeHealthFrontend::default());
    let members = Arc::new(FakeMembersRegistry::new(vec![NodeId::new(1)]));
    let consensus = Arc::new(FakeConsensusLog::default());
    let table = Arc::new(FakeFeatureTable::new(Version::new(0)));
    health.set_alive(NodeId::new(1), true);

    manager.start(
        health_notifier,
        Arc::clone(&leadership_notifier),
        health,
        members,
        Arc::clone(&consensus),
        Arc::clone(&table),
    );
    leadership_notifier.fire_leadership_change(GroupId::new(0), Term::new(1), Some(NodeId::new(1)));

    wait_until(|| !consensus.committed().is_empty()).await;
    assert_eq!(consensus.committed()[0].logical_version, LATEST);
    manager.stop().await;
}

/// S6: stop() during an ongoing transient-error backoff must return
/// promptly rather than waiting out the retry interval.
#[tokio::test]
async fn s6_shutdown_mid_retry_is_prompt() {
    let mut config = FeatureGateConfig::default();
    config.retry_interval = Duration::from_secs(5);
    config.self_node_id = NodeId::new(1);
    let mut manager = FeatureGateManager::new(config);
    let health_notifier = Arc::new(FakeHealthNotifier::default());
    let leadership_notifier = Arc::new(FakeLeadershipNotifier::default());
    let health = Arc::new(FakeHealthFrontend::default());
    let members = Arc::new(FakeMembersRegistry::new(vec![NodeId::new(1)]));
    let consensus = Arc::new(FakeConsensusLog::default());
    let table = Arc::new(FakeFeatureTable::new(Version::new(1)));
    // No liveness set for node 1: every predicate evaluation is transient.

    manager.start(
        Arc::clone(&health_notifier),
        Arc::clone(&leadership_notifier),
        health,
        members,
        consensus,
        Arc::clone(&table),
    );
    leadership_notifier.fire_leadership_change(GroupId::new(0), Term::new(1), Some(NodeId::new(1)));
    health_notifier.fire_node_report(NodeId::new(1), Version::new(2));

    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = tokio::time::Instant::now();
    manager.stop().await;
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "stop() must not wait out the retry interval"
    );
}
