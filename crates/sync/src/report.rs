//! Result aggregation
//!
//! Folds per-node outcomes into counters and an immutable report that is
//! handed to the notifier.

use banmesh_core::{current_timestamp_ms, ActorId, NodeId, SubjectId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::{NodeOutcome, OutcomeBucket};

/// Summary counters. Every outcome lands in exactly one of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Writes performed
    pub applied_count: usize,
    /// Idempotent no-ops
    pub already_count: usize,
    /// Deliberately not attempted
    pub skipped_count: usize,
    /// Nodes that could not be reached
    pub unreachable_count: usize,
    /// Permission or remote failures
    pub error_count: usize,
}

impl Tally {
    /// Classify a list of outcomes
    pub fn from_outcomes(outcomes: &[NodeOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut tally, o| {
            tally.record(o.outcome.bucket());
            tally
        })
    }

    /// Count one outcome
    pub fn record(&mut self, bucket: OutcomeBucket) {
        match bucket {
            OutcomeBucket::Applied => self.applied_count += 1,
            OutcomeBucket::Already => self.already_count += 1,
            OutcomeBucket::Skipped => self.skipped_count += 1,
            OutcomeBucket::Unreachable => self.unreachable_count += 1,
            OutcomeBucket::Error => self.error_count += 1,
        }
    }

    /// Sum of all counters
    pub fn total(&self) -> usize {
        self.applied_count
            + self.already_count
            + self.skipped_count
            + self.unreachable_count
            + self.error_count
    }
}

/// What a report covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportScope {
    /// One ban event fanned out from its origin
    Ban {
        /// Banned subject
        subject: SubjectId,
        /// Node the ban originated on
        origin: NodeId,
    },
    /// One full reconciliation pass
    Reconciliation {
        /// Distinct subjects propagated
        subjects: usize,
    },
    /// One operator-issued unban
    Retraction {
        /// Unbanned subject
        subject: SubjectId,
        /// Operator who asked
        requester: ActorId,
    },
}

/// Aggregated result of one event or run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Unique run identifier
    pub run_id: Uuid,
    /// What was done
    pub scope: ReportScope,
    /// Counters
    #[serde(flatten)]
    pub tally: Tally,
    /// Per-node detail in processing order
    pub outcomes: Vec<NodeOutcome>,
    /// Build time (Unix milliseconds)
    pub generated_at_ms: u64,
}

impl Report {
    /// Aggregate outcomes into a report
    pub fn build(scope: ReportScope, outcomes: Vec<NodeOutcome>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scope,
            tally: Tally::from_outcomes(&outcomes),
            outcomes,
            generated_at_ms: current_timestamp_ms(),
        }
    }

    /// True when no node reported an error
    pub fn is_clean(&self) -> bool {
        self.tally.error_count == 0
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let what = match &self.scope {
            ReportScope::Ban { subject, origin } => format!("Ban of {subject} from {origin}"),
            ReportScope::Reconciliation { subjects } => {
                format!("Reconciliation of {subjects} subject(s)")
            }
            ReportScope::Retraction { subject, requester } => {
                format!("Unban of {subject} by {requester}")
            }
        };
        let t = &self.tally;
        format!(
            "{what}: {} applied, {} already, {} skipped, {} unreachable, {} errors",
            t.applied_count, t.already_count, t.skipped_count, t.unreachable_count, t.error_count
        )
    }
}
