//! Processing lock
//!
//! A TTL lease table keyed by (subject, node). It is the only thing standing
//! between a propagated write and its own echo: applying a ban on node B is
//! observed as a fresh ban event on B, and the held token is how that event
//! is recognised.
//!
//! Tokens that are never released expire after the TTL and are treated as
//! absent, so a crashed or hung attempt cannot wedge a key forever.

use banmesh_core::{NodeId, SubjectId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cancel::CancelSignal;

/// Default token lifetime (30 seconds)
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Lease key
pub type LockKey = (SubjectId, NodeId);

/// Mutual exclusion with lease semantics.
///
/// The in-process [`ProcessingLock`] is the only implementation here; an
/// external lease store can implement the same contract when more than one
/// authority instance runs.
pub trait LeaseStore: Send + Sync {
    /// Compare-and-set: create a token only if no live token exists.
    fn try_acquire(&self, subject: &SubjectId, node: &NodeId) -> bool;

    /// Drop the token for a key, live or not.
    fn release(&self, subject: &SubjectId, node: &NodeId);

    /// Whether a live token exists for the key.
    fn is_held(&self, subject: &SubjectId, node: &NodeId) -> bool;

    /// Remove expired tokens, returning how many were removed.
    fn sweep(&self) -> usize;
}

/// In-memory lease table guarded by a single mutex
#[derive(Debug)]
pub struct ProcessingLock {
    tokens: Mutex<HashMap<LockKey, Instant>>,
    ttl: Duration,
}

impl ProcessingLock {
    /// Create a lock with the default 30s TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_LOCK_TTL)
    }

    /// Create a lock with a custom TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of tokens currently stored, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// True when no tokens are stored
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    // A poisoned table is still a valid table; the panicking holder could
    // only have been mid-insert or mid-remove.
    fn table(&self) -> MutexGuard<'_, HashMap<LockKey, Instant>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_live(&self, acquired_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(acquired_at) <= self.ttl
    }
}

impl Default for ProcessingLock {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaseStore for ProcessingLock {
    fn try_acquire(&self, subject: &SubjectId, node: &NodeId) -> bool {
        let now = Instant::now();
        let mut tokens = self.table();
        let key = (subject.clone(), node.clone());

        if let Some(&acquired_at) = tokens.get(&key) {
            if self.is_live(acquired_at, now) {
                trace!(%subject, %node, "token held");
                return false;
            }
            debug!(%subject, %node, "replacing expired token");
        }

        tokens.insert(key, now);
        true
    }

    fn release(&self, subject: &SubjectId, node: &NodeId) {
        self.table().remove(&(subject.clone(), node.clone()));
    }

    fn is_held(&self, subject: &SubjectId, node: &NodeId) -> bool {
        let now = Instant::now();
        self.table()
            .get(&(subject.clone(), node.clone()))
            .is_some_and(|&acquired_at| self.is_live(acquired_at, now))
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut tokens = self.table();
        let before = tokens.len();
        tokens.retain(|_, acquired_at| self.is_live(*acquired_at, now));
        before - tokens.len()
    }
}

/// Held token, released on drop.
///
/// Dropping the guard covers every exit path of a write, including the run
/// future itself being dropped mid-call.
pub struct LockGuard<'a> {
    store: &'a dyn LeaseStore,
    subject: SubjectId,
    node: NodeId,
}

impl<'a> LockGuard<'a> {
    /// Acquire a token, or `None` if a live one exists.
    pub fn acquire(store: &'a dyn LeaseStore, subject: &SubjectId, node: &NodeId) -> Option<Self> {
        store.try_acquire(subject, node).then(|| Self {
            store,
            subject: subject.clone(),
            node: node.clone(),
        })
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.store.release(&self.subject, &self.node);
    }
}

/// Run [`LeaseStore::sweep`] on a fixed interval until cancelled.
pub fn spawn_sweeper(
    store: Arc<dyn LeaseStore>,
    interval: Duration,
    mut cancel: CancelSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("lock sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let removed = store.sweep();
                    if removed > 0 {
                        debug!(removed, "swept expired processing tokens");
                    }
                }
            }
        }
    })
}
