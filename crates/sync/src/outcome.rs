//! Per-node outcomes of propagation, reconciliation and retraction.

use banmesh_core::{NodeId, SubjectId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GatewayError;

/// What happened on one target node for one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropagationOutcome {
    /// Write issued and accepted
    Applied,
    /// Ban already present; no write issued
    AlreadyPresent,
    /// Retraction target had no ban; no write issued
    WasNotBanned,
    /// Node is the origin of the change
    Skipped {
        /// Origin node
        origin: NodeId,
    },
    /// Another attempt holds the (subject, node) token
    SkippedAsLoop,
    /// Subject is not a member and membership is required
    NotAMember,
    /// Node not joined, session absent, or call timed out
    NodeUnreachable,
    /// Missing ban authority on the node
    PermissionDenied,
    /// Any other remote fault
    Failed {
        /// Raw fault message
        reason: String,
    },
}

/// Report counter an outcome is tallied under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeBucket {
    /// Writes performed
    Applied,
    /// Idempotent no-ops
    Already,
    /// Deliberately not attempted
    Skipped,
    /// Node could not be reached
    Unreachable,
    /// Permission or remote failures
    Error,
}

impl PropagationOutcome {
    /// Counter this outcome belongs to.
    ///
    /// Deliberately has no wildcard arm: a new variant must be classified here.
    pub fn bucket(&self) -> OutcomeBucket {
        match self {
            PropagationOutcome::Applied => OutcomeBucket::Applied,
            PropagationOutcome::AlreadyPresent => OutcomeBucket::Already,
            PropagationOutcome::WasNotBanned => OutcomeBucket::Already,
            PropagationOutcome::Skipped { .. } => OutcomeBucket::Skipped,
            PropagationOutcome::SkippedAsLoop => OutcomeBucket::Skipped,
            PropagationOutcome::NotAMember => OutcomeBucket::Skipped,
            PropagationOutcome::NodeUnreachable => OutcomeBucket::Unreachable,
            PropagationOutcome::PermissionDenied => OutcomeBucket::Error,
            PropagationOutcome::Failed { .. } => OutcomeBucket::Error,
        }
    }

    /// Whether this outcome counts as an error
    pub fn is_error(&self) -> bool {
        self.bucket() == OutcomeBucket::Error
    }

    /// Outcome for a failed write
    pub fn from_write_error(err: &GatewayError) -> Self {
        match err {
            GatewayError::PermissionDenied(_) => PropagationOutcome::PermissionDenied,
            GatewayError::Unreachable(_) => PropagationOutcome::NodeUnreachable,
            GatewayError::Timeout(_) | GatewayError::Remote(_) => PropagationOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }

    /// Outcome for a failed read probe (ban lookup, list, membership)
    pub fn from_read_error(err: &GatewayError) -> Self {
        match err {
            GatewayError::Unreachable(_) | GatewayError::Timeout(_) => {
                PropagationOutcome::NodeUnreachable
            }
            GatewayError::PermissionDenied(_) => PropagationOutcome::PermissionDenied,
            GatewayError::Remote(_) => PropagationOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }
}

impl fmt::Display for PropagationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagationOutcome::Applied => f.write_str("applied"),
            PropagationOutcome::AlreadyPresent => f.write_str("already present"),
            PropagationOutcome::WasNotBanned => f.write_str("was not banned"),
            PropagationOutcome::Skipped { origin } => write!(f, "skipped (origin {origin})"),
            PropagationOutcome::SkippedAsLoop => f.write_str("skipped (in flight)"),
            PropagationOutcome::NotAMember => f.write_str("not a member"),
            PropagationOutcome::NodeUnreachable => f.write_str("node unreachable"),
            PropagationOutcome::PermissionDenied => f.write_str("permission denied"),
            PropagationOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// An outcome attributed to its node and subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOutcome {
    /// Target node
    pub node: NodeId,
    /// Subject acted on; absent for node-level steps such as a failed
    /// ban-list query during reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectId>,
    /// Result on that node
    #[serde(flatten)]
    pub outcome: PropagationOutcome,
}

impl NodeOutcome {
    /// Attribute an outcome
    pub fn new(node: NodeId, subject: SubjectId, outcome: PropagationOutcome) -> Self {
        Self {
            node,
            subject: Some(subject),
            outcome,
        }
    }

    /// An outcome for a node as a whole
    pub fn node_level(node: NodeId, outcome: PropagationOutcome) -> Self {
        Self {
            node,
            subject: None,
            outcome,
        }
    }
}
