//! Sync service
//!
//! The entry points used by the platform adapter: ban events coming in from
//! nodes, and operator commands. Wires the engines over one shared processing
//! lock, gateway and write scheduler.

use banmesh_core::{ActorId, NodeId, SubjectId, SyncSettings};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{NodeGateway, TimedGateway};
use crate::guard::{Admission, BanEvent, EventGuard};
use crate::lock::{LeaseStore, ProcessingLock};
use crate::notify::{deliver_report, Audience, Notifier};
use crate::propagation::PropagationEngine;
use crate::reason::{SyncTag, DEFAULT_REASON};
use crate::reconcile::ReconciliationEngine;
use crate::registry::NodeRegistry;
use crate::report::{Report, ReportScope};
use crate::retraction::RetractionEngine;
use crate::schedule::{FixedDelayGate, WriteScheduler};

/// Who issued a command, and from where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    /// Operator identity
    pub actor: ActorId,
    /// Node the command was issued on
    pub node: NodeId,
    /// Whether the platform grants the operator ban authority on that node
    pub has_ban_authority: bool,
}

/// Operator command surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Reconcile all nodes
    Sync,
    /// Lift a ban on every node
    Unban {
        /// Subject to unban
        subject_id: SubjectId,
        /// Optional audit reason
        reason: Option<String>,
    },
}

/// Facade over the engines
pub struct SyncService {
    registry: Arc<NodeRegistry>,
    gateway: Arc<dyn NodeGateway>,
    lock: Arc<dyn LeaseStore>,
    guard: EventGuard,
    propagation: Arc<PropagationEngine>,
    reconciliation: ReconciliationEngine,
    retraction: RetractionEngine,
    notifier: Arc<dyn Notifier>,
    cancel: CancelSignal,
}

impl SyncService {
    /// Build a service from settings, wrapping `gateway` with the configured timeout
    pub fn new(
        registry: Arc<NodeRegistry>,
        gateway: Arc<dyn NodeGateway>,
        notifier: Arc<dyn Notifier>,
        settings: &SyncSettings,
    ) -> Self {
        let gateway: Arc<dyn NodeGateway> =
            Arc::new(TimedGateway::new(gateway, settings.gateway_timeout()));
        let lock: Arc<dyn LeaseStore> = Arc::new(ProcessingLock::with_ttl(settings.lock_ttl()));
        let scheduler: Arc<dyn WriteScheduler> =
            Arc::new(FixedDelayGate::new(settings.inter_write_delay()));
        let tag = SyncTag::new(settings.sync_tag.clone());

        let propagation = Arc::new(
            PropagationEngine::new(
                registry.clone(),
                gateway.clone(),
                lock.clone(),
                scheduler.clone(),
                tag.clone(),
            )
            .with_membership_required(settings.require_membership),
        );
        let reconciliation =
            ReconciliationEngine::new(registry.clone(), gateway.clone(), propagation.clone())
                .with_workers(settings.reconcile_workers);
        let retraction = RetractionEngine::new(registry.clone(), gateway.clone(), scheduler);

        Self {
            registry,
            gateway,
            guard: EventGuard::new(lock.clone(), tag),
            lock,
            propagation,
            reconciliation,
            retraction,
            notifier,
            cancel: CancelSignal::never(),
        }
    }

    /// Stop in-progress runs when `cancel` fires
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Shared processing lock, for the sweeper task
    pub fn lock(&self) -> Arc<dyn LeaseStore> {
        self.lock.clone()
    }

    /// Node table
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Handle a ban observed on a node.
    ///
    /// Returns `None` when the guard rejects the event as an echo of this
    /// system's own write.
    pub async fn handle_ban_event(&self, mut event: BanEvent) -> SyncResult<Option<Report>> {
        self.registry.require(&event.node)?;

        // Echoes of in-flight writes are dropped before any remote lookup.
        if self.guard.in_flight(&event) {
            debug!(subject = %event.subject, node = %event.node, rejected = ?Admission::EchoInFlight, "ban event ignored");
            return Ok(None);
        }

        if event.reason.is_none() {
            event.reason = self.lookup_reason(&event).await;
        }

        match self.guard.admit(&event) {
            Admission::Accept => {}
            rejected => {
                debug!(subject = %event.subject, node = %event.node, ?rejected, "ban event ignored");
                return Ok(None);
            }
        }

        let reason = event.reason.unwrap_or_else(|| DEFAULT_REASON.to_string());
        info!(subject = %event.subject, origin = %event.node, "propagating ban");
        let outcomes = self
            .propagation
            .propagate(&event.subject, &event.node, &reason, &self.cancel)
            .await?;

        let report = Report::build(
            ReportScope::Ban {
                subject: event.subject,
                origin: event.node,
            },
            outcomes,
        );
        log_summary(&report);
        deliver_report(self.notifier.as_ref(), &self.registry, &Audience::All, &report).await;
        Ok(Some(report))
    }

    /// Execute an operator command after checking authority.
    pub async fn execute(&self, operator: &Operator, command: OperatorCommand) -> SyncResult<Report> {
        self.registry.require(&operator.node)?;
        if !operator.has_ban_authority {
            warn!(actor = %operator.actor, node = %operator.node, ?command, "command rejected");
            return Err(SyncError::Unauthorized {
                actor: operator.actor.clone(),
                node: operator.node.clone(),
            });
        }

        match command {
            OperatorCommand::Sync => {
                info!(actor = %operator.actor, node = %operator.node, "reconciliation requested");
                let report = self.reconciliation.reconcile_all(&self.cancel).await?;
                log_summary(&report);
                deliver_report(
                    self.notifier.as_ref(),
                    &self.registry,
                    &Audience::Node(operator.node.clone()),
                    &report,
                )
                .await;
                Ok(report)
            }
            OperatorCommand::Unban { subject_id, reason } => {
                info!(actor = %operator.actor, subject = %subject_id, "unban requested");
                let outcomes = self
                    .retraction
                    .retract(&subject_id, reason.as_deref(), &operator.actor, &self.cancel)
                    .await?;
                let report = Report::build(
                    ReportScope::Retraction {
                        subject: subject_id,
                        requester: operator.actor.clone(),
                    },
                    outcomes,
                );
                log_summary(&report);
                deliver_report(self.notifier.as_ref(), &self.registry, &Audience::All, &report)
                    .await;
                Ok(report)
            }
        }
    }

    // Platforms often deliver ban events without the reason; it is read back
    // from the node so the tag check has something to inspect.
    async fn lookup_reason(&self, event: &BanEvent) -> Option<String> {
        match self.gateway.get_ban_record(&event.node, &event.subject).await {
            Ok(record) => record.map(|r| r.reason),
            Err(e) => {
                warn!(subject = %event.subject, node = %event.node, error = %e, "ban reason lookup failed");
                None
            }
        }
    }
}

fn log_summary(report: &Report) {
    if report.is_clean() {
        info!(run_id = %report.run_id, "{}", report.summary());
    } else {
        warn!(run_id = %report.run_id, "{}", report.summary());
    }
}
