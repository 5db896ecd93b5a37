//! Event ingestion guard
//!
//! Screens naturally occurring ban events before they are propagated. An
//! event is rejected when it is the echo of a write this system has in
//! flight, or when its reason carries the sync tag.

use banmesh_core::{NodeId, SubjectId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::lock::LeaseStore;
use crate::reason::SyncTag;

/// A ban observed on one node by the platform adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEvent {
    /// Node the ban appeared on
    pub node: NodeId,
    /// Banned subject
    pub subject: SubjectId,
    /// Reason, if the platform delivered one with the event
    pub reason: Option<String>,
}

/// Guard verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Forward to propagation
    Accept,
    /// A token is held for (subject, node): this is our own write
    EchoInFlight,
    /// Reason carries the sync tag
    SyncTagged,
}

impl Admission {
    /// Whether the event should be propagated
    pub fn is_accepted(self) -> bool {
        self == Admission::Accept
    }
}

/// Two-stage event filter
pub struct EventGuard {
    lock: Arc<dyn LeaseStore>,
    tag: SyncTag,
}

impl EventGuard {
    /// Create a guard over the shared processing lock
    pub fn new(lock: Arc<dyn LeaseStore>, tag: SyncTag) -> Self {
        Self { lock, tag }
    }

    /// Lock stage only: whether a token is held for the event's (subject, node).
    pub fn in_flight(&self, event: &BanEvent) -> bool {
        self.lock.is_held(&event.subject, &event.node)
    }

    /// Screen an event.
    ///
    /// The lock check runs first. The tag check still catches echoes whose
    /// token was already released or expired.
    pub fn admit(&self, event: &BanEvent) -> Admission {
        if self.in_flight(event) {
            return Admission::EchoInFlight;
        }
        match event.reason.as_deref() {
            Some(reason) if self.tag.is_tagged(reason) => Admission::SyncTagged,
            _ => Admission::Accept,
        }
    }
}
