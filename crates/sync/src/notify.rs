//! Report delivery
//!
//! The core only emits [`Report`] values. A [`Notifier`] renders and delivers
//! them; delivery is fire-and-forget and failures are logged, never escalated.

use async_trait::async_trait;
use banmesh_core::NodeId;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::{Node, NodeRegistry};
use crate::report::Report;

/// Delivery failures
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Report could not be rendered
    #[error("Render error: {0}")]
    Render(#[from] serde_json::Error),

    /// Sink rejected or dropped the message
    #[error("Delivery to {sink} failed: {reason}")]
    Delivery {
        /// Target sink
        sink: String,
        /// Failure detail
        reason: String,
    },
}

/// Where a report goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// The log sink of one node
    Node(NodeId),
    /// The log sink of every node
    All,
}

/// Renders and delivers reports
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver to one node's log sink
    async fn publish(&self, node: &Node, report: &Report) -> Result<(), NotifyError>;

    /// Deliver to every node's log sink.
    ///
    /// Every node is attempted; the first failure is returned.
    async fn publish_to_all(
        &self,
        registry: &NodeRegistry,
        report: &Report,
    ) -> Result<(), NotifyError> {
        let mut first_error = None;
        for node in registry.iter() {
            if let Err(e) = self.publish(node, report).await {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Deliver a report, logging instead of returning any failure
pub async fn deliver_report(
    notifier: &dyn Notifier,
    registry: &NodeRegistry,
    audience: &Audience,
    report: &Report,
) {
    let result = match audience {
        Audience::All => notifier.publish_to_all(registry, report).await,
        Audience::Node(id) => match registry.get(id) {
            Some(node) => notifier.publish(node, report).await,
            None => {
                warn!(node = %id, run_id = %report.run_id, "report addressed to unknown node");
                return;
            }
        },
    };

    if let Err(e) = result {
        warn!(run_id = %report.run_id, error = %e, "report delivery failed");
    }
}

/// Writes each report to the log, addressed to the node's sink
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn publish(&self, node: &Node, report: &Report) -> Result<(), NotifyError> {
        let Some(sink) = node.log_sink.as_deref() else {
            debug!(node = %node.id, "no log sink configured, report not delivered");
            return Ok(());
        };
        let body = serde_json::to_string(report)?;
        info!(
            target: "banmesh::report",
            node = %node.id,
            sink,
            run_id = %report.run_id,
            summary = %report.summary(),
            %body,
            "report published"
        );
        Ok(())
    }
}
