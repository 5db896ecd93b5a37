//! Write scheduling
//!
//! Remote writes for one subject are spaced out to stay under downstream
//! rate limits. Spacing is tracked per subject, so a slow fan-out for one
//! subject never delays writes for another.

use async_trait::async_trait;
use banmesh_core::SubjectId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Default spacing between writes for the same subject (1 second)
pub const DEFAULT_INTER_WRITE_DELAY: Duration = Duration::from_secs(1);

/// Gate consulted before every remote write
#[async_trait]
pub trait WriteScheduler: Send + Sync {
    /// Wait until a write for `subject` may be issued.
    async fn admit(&self, subject: &SubjectId);
}

/// Fixed minimum delay between writes for the same subject
#[derive(Debug)]
pub struct FixedDelayGate {
    delay: Duration,
    next_slot: Mutex<HashMap<SubjectId, Instant>>,
}

impl FixedDelayGate {
    /// Create a gate with the given spacing
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve the next slot for `subject` and return when it opens.
    fn reserve(&self, subject: &SubjectId) -> Instant {
        let now = Instant::now();
        let mut slots = self.next_slot.lock().unwrap_or_else(|e| e.into_inner());

        // Slots in the past carry no information.
        slots.retain(|_, slot| *slot > now);

        let start = slots.get(subject).copied().unwrap_or(now).max(now);
        slots.insert(subject.clone(), start + self.delay);
        start
    }
}

impl Default for FixedDelayGate {
    fn default() -> Self {
        Self::new(DEFAULT_INTER_WRITE_DELAY)
    }
}

#[async_trait]
impl WriteScheduler for FixedDelayGate {
    async fn admit(&self, subject: &SubjectId) {
        if self.delay.is_zero() {
            return;
        }
        let start = self.reserve(subject);
        tokio::time::sleep_until(start).await;
    }
}
