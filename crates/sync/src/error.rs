//! Error types for BanMesh sync operations.

use banmesh_core::{ActorId, NodeId};
use thiserror::Error;

/// Faults raised by a remote node call.
///
/// These never abort a run; the engines translate each one into a
/// per-node [`PropagationOutcome`](crate::PropagationOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Node not joined or adapter session absent
    #[error("Node unreachable: {0}")]
    Unreachable(NodeId),

    /// Call did not complete within the configured timeout
    #[error("Call to node {0} timed out")]
    Timeout(NodeId),

    /// Insufficient authority at the node
    #[error("Missing ban permission on node {0}")]
    PermissionDenied(NodeId),

    /// Any other remote fault, with the raw message
    #[error("Remote error: {0}")]
    Remote(String),
}

/// Errors that abort a whole sync operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Operator lacks ban authority at the invoking node
    #[error("{actor} lacks ban authority on node {node}")]
    Unauthorized {
        /// Operator identity
        actor: ActorId,
        /// Node the command was issued from
        node: NodeId,
    },

    /// Node id not present in the registry
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Run was cancelled at a checkpoint
    #[error("Run cancelled after {processed} node steps")]
    Cancelled {
        /// Per-node steps completed before the cancel was observed
        processed: usize,
    },

    /// Registry construction failed
    #[error("Registry error: {0}")]
    Registry(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
