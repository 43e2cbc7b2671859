//! Core data types: node identity, logical version, and observations.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Opaque, totally-ordered identifier for a cluster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<NodeId> for u64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Opaque logical version identifying a software/protocol revision.
///
/// `INVALID` sorts below every real version and is used as the fold seed
/// when the registry has no entries yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(i64);

impl Version {
    /// Sentinel strictly less than all real versions.
    pub const INVALID: Self = Self(-1);

    pub const fn new(v: i64) -> Self {
        Self(v)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A single `(node, version)` observation. Never merged or reordered before
/// it reaches the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub node: NodeId,
    pub version: Version,
}

impl Observation {
    pub fn new(node: NodeId, version: Version) -> Self {
        Self { node, version }
    }
}

/// Per-node liveness, as reported by the health frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub node: NodeId,
    pub is_alive: bool,
}

/// Distinguished consensus-group identifier that the leadership notifier
/// filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(u64);

impl GroupId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GroupId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Consensus term, carried by leadership-change notifications. Opaque to
/// this crate beyond logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term(u64);

impl Term {
    pub fn new(term: u64) -> Self {
        Self(term)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The feature-update command replicated through the consensus log.
///
/// `action` is reserved for future use and always encoded as `0`; this core
/// never assigns it semantics (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUpdateCommand {
    pub logical_version: Version,
    pub action: u8,
}

impl FeatureUpdateCommand {
    pub fn new(logical_version: Version) -> Self {
        Self {
            logical_version,
            action: 0,
        }
    }
}
