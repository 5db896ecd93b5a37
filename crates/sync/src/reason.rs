//! Ban reason tagging.
//!
//! Writes issued by this system carry a sentinel prefix in the reason text.
//! When such a write re-surfaces as a platform event, or shows up in a node's
//! ban list during reconciliation, the prefix identifies it as a copy rather
//! than an origin.

use banmesh_core::config::DEFAULT_SYNC_TAG;
use banmesh_core::ActorId;

/// Fallback reason for operator commands issued without one.
pub const DEFAULT_REASON: &str = "No reason provided";

/// Builds and recognises sync-tagged reasons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTag {
    prefix: String,
}

impl SyncTag {
    /// Use a custom sentinel prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Reason written to target nodes for a propagated ban
    pub fn tag(&self, origin_display_name: &str, reason: &str) -> String {
        format!("{} from {}: {}", self.prefix, origin_display_name, reason)
    }

    /// Whether a reason was written by this system.
    ///
    /// Leading whitespace is ignored since some platforms pad the audit text.
    pub fn is_tagged(&self, reason: &str) -> bool {
        reason.trim_start().starts_with(&self.prefix)
    }
}

impl Default for SyncTag {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_TAG)
    }
}

/// Audit reason for a retraction
pub fn retraction_reason(reason: Option<&str>, requester: &ActorId) -> String {
    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REASON);
    format!("{reason} (requested by {requester})")
}
