//! In-memory mapping from node identity to last-reported logical version.

use std::collections::HashMap;

use crate::types::{NodeId, Version};

/// Last-reported logical version per node.
///
/// Monotonicity is not enforced at insert: the latest observation always
/// wins for a given key. Entries for nodes that have since left the cluster
/// may linger; the advance predicate filters them out via the members
/// registry.
#[derive(Debug, Default, Clone)]
pub struct VersionRegistry {
    versions: HashMap<NodeId, Version>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally overwrites the version recorded for `node`.
    pub fn set(&mut self, node: NodeId, version: Version) {
        self.versions.insert(node, version);
    }

    /// Returns the last-reported version for `node`, if any.
    pub fn get(&self, node: NodeId) -> Option<Version> {
        self.versions.get(&node).copied()
    }

    /// Snapshot of all entries. No ordering is guaranteed.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Version)> + '_ {
        self.versions.iter().map(|(&n, &v)| (n, v))
    }

    /// The maximum version across all entries, or `Version::INVALID` if the
    /// registry is empty.
    pub fn max_version(&self) -> Version {
        self.versions
            .values()
            .copied()
            .max()
            .unwrap_or(Version::INVALID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_last_writer_wins() {
        let mut registry = VersionRegistry::new();
        let node = NodeId::new(1);
        registry.set(node, Version::new(3));
        registry.set(node, Version::new(1));
        assert_eq!(registry.get(node), Some(Version::new(1)));
    }

    #[test]
    fn max_version_empty_is_invalid() {
        let registry = VersionRegistry::new();
        assert_eq!(registry.max_version(), Version::INVALID);
    }

    #[test]
    fn max_version_across_nodes() {
        let mut registry = VersionRegistry::new();
        registry.set(NodeId::new(1), Version::new(11));
        registry.set(NodeId::new(2), Version::new(10));
        registry.set(NodeId::new(3), Version::new(12));
        assert_eq!(registry.max_version(), Version::new(12));
    }

    #[test]
    fn get_missing_node_is_none() {
        let registry = VersionRegistry::new();
        assert_eq!(registry.get(NodeId::new(9)), None);
    }

    #[test]
    fn departed_node_entry_lingers() {
        let mut registry = VersionRegistry::new();
        registry.set(NodeId::new(1), Version::new(5));
        // No remove operation exists: lingering entries are the caller's
        // (the predicate's) responsibility to ignore via membership.
        assert_eq!(registry.get(NodeId::new(1)), Some(Version::new(5)));
    }
}
