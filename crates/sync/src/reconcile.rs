//! Reconciliation engine
//!
//! A full-mesh pass: read every node's ban list, take the union of bans that
//! originated on some node (sync-tagged copies are never origins), then run
//! the propagation engine once per distinct subject.

use banmesh_core::SubjectId;
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{BanRecord, NodeGateway};
use crate::outcome::{NodeOutcome, PropagationOutcome};
use crate::propagation::PropagationEngine;
use crate::reason::SyncTag;
use crate::registry::NodeRegistry;
use crate::report::{Report, ReportScope};

/// Deduplicate ban records by subject.
///
/// The first record seen for a subject wins. Records whose reason carries the
/// sync tag are dropped before deduplication, so a tagged copy seen first
/// never shadows the real origin seen later.
pub fn ban_union<I>(records: I, tag: &SyncTag) -> Vec<BanRecord>
where
    I: IntoIterator<Item = BanRecord>,
{
    let mut seen: HashSet<SubjectId> = HashSet::new();
    records
        .into_iter()
        .filter(|r| !tag.is_tagged(&r.reason))
        .filter(|r| seen.insert(r.subject.clone()))
        .collect()
}

/// Operator-triggered full-state sync
pub struct ReconciliationEngine {
    registry: Arc<NodeRegistry>,
    gateway: Arc<dyn NodeGateway>,
    propagation: Arc<PropagationEngine>,
    workers: usize,
}

impl ReconciliationEngine {
    /// Create an engine driving `propagation` one subject at a time
    pub fn new(
        registry: Arc<NodeRegistry>,
        gateway: Arc<dyn NodeGateway>,
        propagation: Arc<PropagationEngine>,
    ) -> Self {
        Self {
            registry,
            gateway,
            propagation,
            workers: 1,
        }
    }

    /// Propagate up to `workers` subjects concurrently.
    ///
    /// Nodes within one subject stay sequential; the processing lock is keyed
    /// by subject, so distinct subjects never contend.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Run one reconciliation pass.
    pub async fn reconcile_all(&self, cancel: &CancelSignal) -> SyncResult<Report> {
        let (records, mut outcomes) = self.collect(cancel).await?;
        let union = ban_union(records, self.propagation.tag());
        info!(subjects = union.len(), workers = self.workers, "reconciliation union built");

        let subjects = union.len();
        let mut runs = stream::iter((0..union.len()).map(|i| {
            let record = &union[i];
            self.propagation
                .propagate(&record.subject, &record.origin_node, &record.reason, cancel)
        }))
        .buffered(self.workers);

        while let Some(result) = runs.next().await {
            match result {
                Ok(run) => outcomes.extend(run),
                Err(SyncError::Cancelled { processed }) => {
                    let processed = outcomes.len() + processed;
                    info!(processed, "reconciliation cancelled");
                    return Err(SyncError::Cancelled { processed });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Report::build(ReportScope::Reconciliation { subjects }, outcomes))
    }

    /// Read every reachable node's ban list.
    ///
    /// A node that cannot be listed contributes a node-level outcome and no
    /// records; it never fails the pass.
    async fn collect(
        &self,
        cancel: &CancelSignal,
    ) -> SyncResult<(Vec<BanRecord>, Vec<NodeOutcome>)> {
        let mut records = Vec::new();
        let mut outcomes = Vec::new();

        for (step, node) in self.registry.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(processed = step, "reconciliation cancelled during collection");
                return Err(SyncError::Cancelled { processed: step });
            }

            if !self.gateway.is_reachable(&node.id).await {
                warn!(node = %node.id, "node unreachable, excluded from union");
                outcomes.push(NodeOutcome::node_level(
                    node.id.clone(),
                    PropagationOutcome::NodeUnreachable,
                ));
                continue;
            }

            match self.gateway.list_ban_records(&node.id).await {
                Ok(list) => {
                    debug!(node = %node.id, bans = list.len(), "ban list collected");
                    records.extend(list);
                }
                Err(e) => {
                    warn!(node = %node.id, error = %e, "ban list query failed, excluded from union");
                    outcomes.push(NodeOutcome::node_level(
                        node.id.clone(),
                        PropagationOutcome::NodeUnreachable,
                    ));
                }
            }
        }

        Ok((records, outcomes))
    }
}
