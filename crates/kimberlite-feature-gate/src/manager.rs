//! Lifecycle facade: wires the shared state, wake signal, notifier
//! registration, and reconciler task together and exposes start/stop.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::adapters::FeatureGateHandle;
use crate::collaborators::{
    ConsensusLog, FeatureTable, HealthFrontend, HealthNotifier, LeadershipNotifier,
    MembersRegistry,
};
use crate::config::FeatureGateConfig;
use crate::reconciler;
use crate::state::SharedState;
use crate::wake::WakeSignal;

/// Owns the reconciler task for one controller group, plus the two
/// notifier registrations that feed it.
///
/// Construction does not spawn or register anything; call
/// [`FeatureGateManager::start`] once the collaborators are ready, and
/// [`FeatureGateManager::stop`] to unwind in the reverse order. Dropping a
/// started manager without calling `stop` leaves the reconciler task and
/// both callback registrations live — callers are expected to call `stop`
/// during their own shutdown sequence, the same way `kimberlite-cluster`'s
/// supervisor expects an explicit stop rather than relying on `Drop` for
/// orderly teardown.
pub struct FeatureGateManager {
    state: Arc<SharedState>,
    wake: Arc<WakeSignal>,
    config: FeatureGateConfig,
    task: Option<JoinHandle<()>>,
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl FeatureGateManager {
    pub fn new(config: FeatureGateConfig) -> Self {
        Self {
            state: Arc::new(SharedState::new()),
            wake: Arc::new(WakeSignal::new()),
            config,
            task: None,
            unregister: None,
        }
    }

    /// A cheaply-clonable handle into this manager's state and wake signal.
    ///
    /// `start` uses this internally to wire the two notifier callbacks;
    /// exposed publicly for tests and for embedders that want to drive the
    /// adapters directly rather than through [`HealthNotifier`] /
    /// [`LeadershipNotifier`] implementations.
    pub fn handle(&self) -> FeatureGateHandle {
        FeatureGateHandle::new(Arc::clone(&self.state), Arc::clone(&self.wake))
    }

    /// Registers the leadership and health callbacks, then spawns the
    /// reconciler task, in that order (§4.G start sequence).
    pub fn start<HN, LN, H, M, C, F>(
        &mut self,
        health_notifier: HN,
        leadership_notifier: LN,
        health: H,
        members: M,
        consensus: C,
        feature_table: F,
    ) where
        HN: HealthNotifier + Clone + 'static,
        LN: LeadershipNotifier + Clone + 'static,
        H: HealthFrontend + 'static,
        M: MembersRegistry + 'static,
        C: ConsensusLog + 'static,
        F: FeatureTable + Clone + 'static,
    {
        assert!(self.task.is_none(), "feature gate manager already started");
        tracing::info!("starting feature gate reconciler");

        let controller_group_id = self.config.controller_group_id;
        let self_node_id = self.config.self_node_id;
        let handle = self.handle();

        // 1. Register leadership callback.
        let leadership_handle = handle.clone();
        let feature_table_for_leadership = feature_table.clone();
        let leadership_registration = leadership_notifier.register_leadership_notification(
            Box::new(move |group, term, leader_id| {
                let is_leader = leader_id == Some(self_node_id);
                leadership_handle.on_leadership_change(
                    controller_group_id,
                    group,
                    term,
                    is_leader,
                    self_node_id,
                    &feature_table_for_leadership,
                );
            }),
        );

        // 2. Register health callback.
        let health_handle = handle;
        let health_registration = health_notifier.register_node_callback(Box::new(
            move |node, version| health_handle.on_node_version_report(node, version),
        ));

        // 3. Spawn the reconciler task.
        let task = tokio::spawn(reconciler::run(
            Arc::clone(&self.state),
            Arc::clone(&self.wake),
            self.config.clone(),
            health,
            members,
            consensus,
            feature_table,
        ));
        self.task = Some(task);

        self.unregister = Some(Box::new(move || {
            leadership_notifier.unregister_leadership_notification(leadership_registration);
            health_notifier.unregister_node_callback(health_registration);
        }));
    }

    /// Unregisters both callbacks, breaks the wake signal, and waits for the
    /// reconciler task to exit, in that order (§4.G stop sequence) — no
    /// callback registered by `start` can fire once this returns.
    pub async fn stop(&mut self) {
        tracing::info!("stopping feature gate reconciler");
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
        self.wake.brk();
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(%error, "reconciler task did not exit cleanly");
            }
        }
    }

    pub fn is_leader(&self) -> bool {
        self.state.is_leader()
    }
}
