//! Tunables for the feature-gate reconciler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{GroupId, NodeId};

/// Configuration for a [`crate::manager::FeatureGateManager`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureGateConfig {
    /// The consensus group whose leadership this component tracks.
    /// `FeatureGateManager::start` passes this automatically into the
    /// leadership adapter, so notifications for any other group are
    /// ignored without callers needing to filter themselves.
    pub controller_group_id: GroupId,

    /// This node's own id, used to tell whether a leadership-change
    /// notification elected this node, and as the target of the
    /// self-injected bootstrap observation on first becoming leader.
    pub self_node_id: NodeId,

    /// Governs both the failure-backoff sleep and the consensus-write
    /// deadline. Fixed at 5 seconds in production; tests may shorten it for
    /// determinism.
    #[serde(with = "duration_secs")]
    pub retry_interval: Duration,
}

impl Default for FeatureGateConfig {
    fn default() -> Self {
        Self {
            controller_group_id: GroupId::new(0),
            self_node_id: NodeId::new(0),
            retry_interval: Duration::from_secs(5),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(de)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_interval_is_five_seconds() {
        let config = FeatureGateConfig::default();
        assert_eq!(config.retry_interval, Duration::from_secs(5));
        assert_eq!(config.controller_group_id, GroupId::new(0));
        assert_eq!(config.self_node_id, NodeId::new(0));
    }
}
