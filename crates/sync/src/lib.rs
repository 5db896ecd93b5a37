//! BanMesh Sync - moderation state replication across nodes
//!
//! This crate replicates ban and unban actions across a set of independently
//! administered nodes, each holding its own authoritative ban list.
//! It handles:
//! - The static node registry
//! - Event-driven propagation of one node's ban to every other node
//! - Operator-triggered reconciliation of the union of all ban lists
//! - Operator-triggered retraction (unban) across all nodes
//! - Loop prevention through a TTL processing lock and a sync-tagged reason
//! - Per-node outcome aggregation into reports
//!
//! # Architecture
//!
//! Events and commands flow through the following pipeline:
//! 1. Ban event screened by `EventGuard`, or operator command authorised by `SyncService`
//! 2. `PropagationEngine`, `ReconciliationEngine` or `RetractionEngine` run
//! 3. Remote calls go through `NodeGateway`, writes gated by `ProcessingLock`
//!    and spaced by `FixedDelayGate`
//! 4. Outcomes aggregated into a `Report`
//! 5. Report handed to a `Notifier`
//!
//! # Examples
//!
//! ```no_run
//! use banmesh_core::{NodeId, SubjectId, SyncSettings};
//! use banmesh_sync::{
//!     BanEvent, InMemoryGateway, Node, NodeRegistry, SyncService, TracingNotifier,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), banmesh_sync::SyncError> {
//! let registry = NodeRegistry::new(vec![
//!     Node { id: NodeId::new("a"), display_name: "Alpha".into(), log_sink: None },
//!     Node { id: NodeId::new("b"), display_name: "Bravo".into(), log_sink: None },
//! ])?;
//! let gateway = Arc::new(InMemoryGateway::with_nodes(["a", "b"]));
//! let service = SyncService::new(
//!     Arc::new(registry),
//!     gateway,
//!     Arc::new(TracingNotifier),
//!     &SyncSettings::default(),
//! );
//!
//! let _report = service
//!     .handle_ban_event(BanEvent {
//!         node: NodeId::new("a"),
//!         subject: SubjectId::new("u1"),
//!         reason: Some("spam".into()),
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cancel;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod lock;
pub mod memory;
pub mod notify;
pub mod outcome;
pub mod propagation;
pub mod reason;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod retraction;
pub mod schedule;
pub mod service;

// Re-export commonly used types
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use error::{GatewayError, SyncError, SyncResult};
pub use gateway::{BanRecord, NodeGateway, TimedGateway};
pub use guard::{Admission, BanEvent, EventGuard};
pub use lock::{spawn_sweeper, LeaseStore, LockGuard, ProcessingLock};
pub use memory::InMemoryGateway;
pub use notify::{deliver_report, Audience, Notifier, NotifyError, TracingNotifier};
pub use outcome::{NodeOutcome, OutcomeBucket, PropagationOutcome};
pub use propagation::PropagationEngine;
pub use reason::SyncTag;
pub use reconcile::{ban_union, ReconciliationEngine};
pub use registry::{Node, NodeRegistry};
pub use report::{Report, ReportScope, Tally};
pub use retraction::RetractionEngine;
pub use schedule::{FixedDelayGate, WriteScheduler};
pub use service::{Operator, OperatorCommand, SyncService};
