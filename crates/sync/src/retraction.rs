//! Retraction engine
//!
//! Lifts a subject's ban on every node. Retraction is always operator-issued
//! and has no origin node, so it takes no processing tokens.

use banmesh_core::{ActorId, SubjectId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{SyncError, SyncResult};
use crate::gateway::NodeGateway;
use crate::outcome::{NodeOutcome, PropagationOutcome};
use crate::reason::retraction_reason;
use crate::registry::{Node, NodeRegistry};
use crate::schedule::WriteScheduler;

/// Node-agnostic unban across the registry
pub struct RetractionEngine {
    registry: Arc<NodeRegistry>,
    gateway: Arc<dyn NodeGateway>,
    scheduler: Arc<dyn WriteScheduler>,
}

impl RetractionEngine {
    /// Create an engine
    pub fn new(
        registry: Arc<NodeRegistry>,
        gateway: Arc<dyn NodeGateway>,
        scheduler: Arc<dyn WriteScheduler>,
    ) -> Self {
        Self {
            registry,
            gateway,
            scheduler,
        }
    }

    /// Remove the ban on `subject` from every node, in registry order.
    pub async fn retract(
        &self,
        subject: &SubjectId,
        reason: Option<&str>,
        requester: &ActorId,
        cancel: &CancelSignal,
    ) -> SyncResult<Vec<NodeOutcome>> {
        let audit_reason = retraction_reason(reason, requester);
        let mut outcomes = Vec::with_capacity(self.registry.len());

        for node in self.registry.iter() {
            if cancel.is_cancelled() {
                info!(%subject, processed = outcomes.len(), "retraction cancelled");
                return Err(SyncError::Cancelled {
                    processed: outcomes.len(),
                });
            }

            let outcome = self.retract_on(node, subject, &audit_reason).await;
            if outcome.is_error() {
                warn!(%subject, node = %node.id, %outcome, "retraction failed on node");
            } else {
                debug!(%subject, node = %node.id, %outcome, "retraction step");
            }
            outcomes.push(NodeOutcome::new(node.id.clone(), subject.clone(), outcome));
        }

        Ok(outcomes)
    }

    async fn retract_on(
        &self,
        node: &Node,
        subject: &SubjectId,
        audit_reason: &str,
    ) -> PropagationOutcome {
        if !self.gateway.is_reachable(&node.id).await {
            return PropagationOutcome::NodeUnreachable;
        }

        if !self.gateway.has_ban_permission(&node.id).await {
            return PropagationOutcome::PermissionDenied;
        }

        match self.gateway.get_ban_record(&node.id, subject).await {
            Ok(Some(_)) => {}
            Ok(None) => return PropagationOutcome::WasNotBanned,
            Err(e) => return PropagationOutcome::from_read_error(&e),
        }

        self.scheduler.admit(subject).await;

        match self.gateway.remove_ban(&node.id, subject, audit_reason).await {
            Ok(()) => PropagationOutcome::Applied,
            Err(e) => PropagationOutcome::from_write_error(&e),
        }
    }
}
