//! Remote node gateway
//!
//! Abstract per-node operations against the chat platform. The engines only
//! ever see this trait; the platform client lives in the adapter layer.

use async_trait::async_trait;
use banmesh_core::{NodeId, SubjectId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::GatewayError;

/// A ban as observed on one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Banned identity
    pub subject: SubjectId,
    /// Node the record was read from
    pub origin_node: NodeId,
    /// Free-text reason stored by the node
    pub reason: String,
    /// When the record was read (Unix milliseconds)
    pub observed_at_ms: u64,
}

/// Per-node remote operations.
///
/// Reachability and permission probes answer `false` on any fault. All other
/// calls surface faults as [`GatewayError`].
#[async_trait]
pub trait NodeGateway: Send + Sync {
    /// Whether the node is joined and a session exists
    async fn is_reachable(&self, node: &NodeId) -> bool;

    /// Whether this system holds ban authority on the node
    async fn has_ban_permission(&self, node: &NodeId) -> bool;

    /// Current ban for a subject, if any
    async fn get_ban_record(
        &self,
        node: &NodeId,
        subject: &SubjectId,
    ) -> Result<Option<BanRecord>, GatewayError>;

    /// Every ban on the node
    async fn list_ban_records(&self, node: &NodeId) -> Result<Vec<BanRecord>, GatewayError>;

    /// Ban a subject with the given reason
    async fn apply_ban(
        &self,
        node: &NodeId,
        subject: &SubjectId,
        reason: &str,
    ) -> Result<(), GatewayError>;

    /// Lift a subject's ban, recording the given audit reason
    async fn remove_ban(
        &self,
        node: &NodeId,
        subject: &SubjectId,
        reason: &str,
    ) -> Result<(), GatewayError>;

    /// Whether the subject is currently a member of the node
    async fn is_member(&self, node: &NodeId, subject: &SubjectId) -> Result<bool, GatewayError>;
}

/// Applies a fixed timeout to every call of an inner gateway.
///
/// A probe that times out answers `false`; any other call that times out
/// fails with [`GatewayError::Timeout`].
pub struct TimedGateway {
    inner: Arc<dyn NodeGateway>,
    timeout: Duration,
}

impl TimedGateway {
    /// Wrap a gateway
    pub fn new(inner: Arc<dyn NodeGateway>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn call<T, F>(&self, node: &NodeId, op: &'static str, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%node, op, timeout_ms = self.timeout.as_millis() as u64, "gateway call timed out");
                Err(GatewayError::Timeout(node.clone()))
            }
        }
    }

    async fn probe<F>(&self, node: &NodeId, op: &'static str, fut: F) -> bool
    where
        F: Future<Output = bool> + Send,
    {
        self.call(node, op, async { Ok(fut.await) })
            .await
            .unwrap_or(false)
    }
}

#[async_trait]
impl NodeGateway for TimedGateway {
    async fn is_reachable(&self, node: &NodeId) -> bool {
        self.probe(node, "is_reachable", self.inner.is_reachable(node))
            .await
    }

    async fn has_ban_permission(&self, node: &NodeId) -> bool {
        self.probe(node, "has_ban_permission", self.inner.has_ban_permission(node))
            .await
    }

    async fn get_ban_record(
        &self,
        node: &NodeId,
        subject: &SubjectId,
    ) -> Result<Option<BanRecord>, GatewayError> {
        self.call(node, "get_ban_record", self.inner.get_ban_record(node, subject))
            .await
    }

    async fn list_ban_records(&self, node: &NodeId) -> Result<Vec<BanRecord>, GatewayError> {
        self.call(node, "list_ban_records", self.inner.list_ban_records(node))
            .await
    }

    async fn apply_ban(
        &self,
        node: &NodeId,
        subject: &SubjectId,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.call(node, "apply_ban", self.inner.apply_ban(node, subject, reason))
            .await
    }

    async fn remove_ban(
        &self,
        node: &NodeId,
        subject: &SubjectId,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.call(node, "remove_ban", self.inner.remove_ban(node, subject, reason))
            .await
    }

    async fn is_member(&self, node: &NodeId, subject: &SubjectId) -> Result<bool, GatewayError> {
        self.call(node, "is_member", self.inner.is_member(node, subject))
            .await
    }
}
