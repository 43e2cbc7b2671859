//! Error types and the reconciliation outcome.

use thiserror::Error;

use crate::types::{NodeId, Version};

/// Transient conditions encountered while evaluating the advance predicate.
///
/// Every variant is retryable: the caller backs off for `retry_interval` and
/// tries again. None of these indicate corrupted state.
#[derive(Error, Debug)]
pub enum Error {
    /// The health frontend failed to answer `get_nodes_status`.
    #[error("failed to get node health status: {0}")]
    HealthQueryFailed(String),

    /// A current member has no liveness record at all.
    #[error("node {0} has no health state")]
    MissingLiveness(NodeId),

    /// A current member is known but reported as not alive.
    #[error("node {0} is not alive")]
    NodeDown(NodeId),

    /// The consensus log rejected the write for a reason other than
    /// `not_leader`.
    #[error("failed to replicate feature update to version {0}: {1}")]
    ReplicateFailed(Version, String),
}

/// Result of one evaluation of the advance predicate.
#[derive(Debug)]
pub enum Outcome {
    /// The active version should advance to the carried value; publication
    /// succeeded.
    Advance(Version),
    /// No publication happened, and no error occurred. The reconciler
    /// returns to waiting on the wake signal.
    Defer,
    /// A transient error occurred; the reconciler backs off and retries.
    Transient(Error),
}
