//! Propagation engine
//!
//! Fans one subject's ban out from its origin node to every other node.
//! Both the event path and reconciliation call [`PropagationEngine::propagate`];
//! the origin is the only thing that differs between them.
//!
//! # Per-node pipeline (registry order)
//!
//! 1. Node unreachable → `NodeUnreachable`
//! 2. Node is the origin → `Skipped`
//! 3. Subject already banned → `AlreadyPresent` (no write)
//! 4. No ban authority → `PermissionDenied`
//! 5. Membership required and subject absent → `NotAMember`
//! 6. Token for (subject, node) already held → `SkippedAsLoop`
//! 7. Wait for the subject's next write slot
//! 8. Token for (subject, node) taken meanwhile → `SkippedAsLoop`
//! 9. Write with a sync-tagged reason → `Applied` / `PermissionDenied` / `Failed`
//!
//! Nodes are processed sequentially; a failure on one node never stops the
//! others. Cancellation is observed between nodes and while waiting for a
//! write slot.

use banmesh_core::{NodeId, SubjectId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{SyncError, SyncResult};
use crate::gateway::NodeGateway;
use crate::lock::{LeaseStore, LockGuard};
use crate::outcome::{NodeOutcome, PropagationOutcome};
use crate::reason::SyncTag;
use crate::registry::{Node, NodeRegistry};
use crate::schedule::WriteScheduler;

/// Fan-out of ban changes across the registry
pub struct PropagationEngine {
    registry: Arc<NodeRegistry>,
    gateway: Arc<dyn NodeGateway>,
    lock: Arc<dyn LeaseStore>,
    scheduler: Arc<dyn WriteScheduler>,
    tag: SyncTag,
    require_membership: bool,
}

impl PropagationEngine {
    /// Create an engine
    pub fn new(
        registry: Arc<NodeRegistry>,
        gateway: Arc<dyn NodeGateway>,
        lock: Arc<dyn LeaseStore>,
        scheduler: Arc<dyn WriteScheduler>,
        tag: SyncTag,
    ) -> Self {
        Self {
            registry,
            gateway,
            lock,
            scheduler,
            tag,
            require_membership: false,
        }
    }

    /// Report `NotAMember` instead of banning subjects absent from a node
    pub fn with_membership_required(mut self, required: bool) -> Self {
        self.require_membership = required;
        self
    }

    /// Sync tag used for written reasons
    pub fn tag(&self) -> &SyncTag {
        &self.tag
    }

    /// Propagate a ban of `subject` from `origin` to every other node.
    ///
    /// Returns one outcome per registered node, in registry order. The cancel
    /// signal is checked before each node and during the wait for a write
    /// slot; no token is held at either point.
    pub async fn propagate(
        &self,
        subject: &SubjectId,
        origin: &NodeId,
        reason: &str,
        cancel: &CancelSignal,
    ) -> SyncResult<Vec<NodeOutcome>> {
        let tagged_reason = self.tag.tag(&self.registry.display_name(origin), reason);
        let mut outcomes = Vec::with_capacity(self.registry.len());

        for node in self.registry.iter() {
            if cancel.is_cancelled() {
                info!(%subject, %origin, processed = outcomes.len(), "propagation cancelled");
                return Err(SyncError::Cancelled {
                    processed: outcomes.len(),
                });
            }

            let Some(outcome) = self
                .propagate_to(node, subject, origin, &tagged_reason, cancel)
                .await
            else {
                info!(%subject, %origin, processed = outcomes.len(), "propagation cancelled awaiting write slot");
                return Err(SyncError::Cancelled {
                    processed: outcomes.len(),
                });
            };
            if outcome.is_error() {
                warn!(%subject, node = %node.id, %outcome, "propagation failed on node");
            } else {
                debug!(%subject, node = %node.id, %outcome, "propagation step");
            }
            outcomes.push(NodeOutcome::new(node.id.clone(), subject.clone(), outcome));
        }

        Ok(outcomes)
    }

    async fn propagate_to(
        &self,
        node: &Node,
        subject: &SubjectId,
        origin: &NodeId,
        tagged_reason: &str,
        cancel: &CancelSignal,
    ) -> Option<PropagationOutcome> {
        if !self.gateway.is_reachable(&node.id).await {
            return Some(PropagationOutcome::NodeUnreachable);
        }

        if &node.id == origin {
            return Some(PropagationOutcome::Skipped {
                origin: origin.clone(),
            });
        }

        match self.gateway.get_ban_record(&node.id, subject).await {
            Ok(Some(_)) => return Some(PropagationOutcome::AlreadyPresent),
            Ok(None) => {}
            Err(e) => return Some(PropagationOutcome::from_read_error(&e)),
        }

        if !self.gateway.has_ban_permission(&node.id).await {
            return Some(PropagationOutcome::PermissionDenied);
        }

        if self.require_membership {
            match self.gateway.is_member(&node.id, subject).await {
                Ok(true) => {}
                Ok(false) => return Some(PropagationOutcome::NotAMember),
                Err(e) => return Some(PropagationOutcome::from_read_error(&e)),
            }
        }

        // A key already in flight never takes a write slot.
        if self.lock.is_held(subject, &node.id) {
            return Some(PropagationOutcome::SkippedAsLoop);
        }

        let mut cancel = cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = self.scheduler.admit(subject) => {}
        }

        let Some(_token) = LockGuard::acquire(self.lock.as_ref(), subject, &node.id) else {
            return Some(PropagationOutcome::SkippedAsLoop);
        };

        Some(match self.gateway.apply_ban(&node.id, subject, tagged_reason).await {
            Ok(()) => PropagationOutcome::Applied,
            Err(e) => PropagationOutcome::from_write_error(&e),
        })
    }
}
