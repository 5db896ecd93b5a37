//! In-memory node gateway.
//!
//! Holds ban lists, membership and capability flags for a set of simulated
//! nodes. Used by the node service's console and by tests. Optionally echoes
//! every applied ban as a [`BanEvent`], mirroring how a platform reports a
//! ban written by this system back as a new event.

use async_trait::async_trait;
use banmesh_core::{current_timestamp_ms, NodeId, SubjectId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::gateway::{BanRecord, NodeGateway};
use crate::guard::BanEvent;

#[derive(Debug)]
struct NodeState {
    reachable: bool,
    can_ban: bool,
    // Insertion order is preserved so list results are deterministic.
    bans: Vec<(SubjectId, String)>,
    members: HashSet<SubjectId>,
    write_failure: Option<String>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            reachable: true,
            can_ban: true,
            bans: Vec::new(),
            members: HashSet::new(),
            write_failure: None,
        }
    }
}

impl NodeState {
    fn ban(&self, subject: &SubjectId) -> Option<&str> {
        self.bans
            .iter()
            .find(|(s, _)| s == subject)
            .map(|(_, reason)| reason.as_str())
    }
}

/// Simulated nodes behind the [`NodeGateway`] interface
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    nodes: Mutex<HashMap<NodeId, NodeState>>,
    echo: Mutex<Option<mpsc::UnboundedSender<BanEvent>>>,
    writes: AtomicUsize,
    lookups: AtomicUsize,
}

impl InMemoryGateway {
    /// Empty gateway; unknown nodes are unreachable
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway with the given reachable, permitted nodes
    pub fn with_nodes<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        let gateway = Self::new();
        for id in ids {
            gateway.add_node(&id.into());
        }
        gateway
    }

    fn state(&self) -> MutexGuard<'_, HashMap<NodeId, NodeState>> {
        self.nodes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_node<T>(&self, node: &NodeId, f: impl FnOnce(&mut NodeState) -> T) -> Option<T> {
        self.state().get_mut(node).map(f)
    }

    /// Register a reachable node with ban permission
    pub fn add_node(&self, node: &NodeId) {
        self.state().entry(node.clone()).or_default();
    }

    /// Toggle reachability
    pub fn set_reachable(&self, node: &NodeId, reachable: bool) {
        self.with_node(node, |n| n.reachable = reachable);
    }

    /// Toggle ban permission
    pub fn set_permission(&self, node: &NodeId, can_ban: bool) {
        self.with_node(node, |n| n.can_ban = can_ban);
    }

    /// Make every write to the node fail with a remote error
    pub fn fail_writes(&self, node: &NodeId, message: &str) {
        self.with_node(node, |n| n.write_failure = Some(message.to_string()));
    }

    /// Place a ban directly, without echo or write accounting
    pub fn seed_ban(&self, node: &NodeId, subject: &SubjectId, reason: &str) {
        self.with_node(node, |n| {
            n.bans.retain(|(s, _)| s != subject);
            n.bans.push((subject.clone(), reason.to_string()));
        });
    }

    /// Add a member to a node
    pub fn add_member(&self, node: &NodeId, subject: &SubjectId) {
        self.with_node(node, |n| n.members.insert(subject.clone()));
    }

    /// Stored reason of a subject's ban on a node
    pub fn ban_reason(&self, node: &NodeId, subject: &SubjectId) -> Option<String> {
        self.with_node(node, |n| n.ban(subject).map(str::to_string))
            .flatten()
    }

    /// Whether a subject is banned on a node
    pub fn is_banned(&self, node: &NodeId, subject: &SubjectId) -> bool {
        self.ban_reason(node, subject).is_some()
    }

    /// Number of successful writes (bans and unbans)
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of single-subject ban lookups served
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Receive a [`BanEvent`] for every applied ban from now on
    pub fn subscribe_echo(&self) -> mpsc::UnboundedReceiver<BanEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.echo.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        rx
    }

    fn emit_echo(&self, event: BanEvent) {
        if let Some(tx) = self.echo.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let _ = tx.send(event);
        }
    }

    fn writable(&self, node: &NodeId) -> Result<(), GatewayError> {
        self.with_node(node, |n| {
            if !n.reachable {
                Err(GatewayError::Unreachable(node.clone()))
            } else if !n.can_ban {
                Err(GatewayError::PermissionDenied(node.clone()))
            } else if let Some(message) = &n.write_failure {
                Err(GatewayError::Remote(message.clone()))
            } else {
                Ok(())
            }
        })
        .unwrap_or_else(|| Err(GatewayError::Unreachable(node.clone())))
    }

    fn readable(&self, node: &NodeId) -> Result<(), GatewayError> {
        match self.with_node(node, |n| n.reachable) {
            Some(true) => Ok(()),
            _ => Err(GatewayError::Unreachable(node.clone())),
        }
    }
}

#[async_trait]
impl NodeGateway for InMemoryGateway {
    async fn is_reachable(&self, node: &NodeId) -> bool {
        self.readable(node).is_ok()
    }

    async fn has_ban_permission(&self, node: &NodeId) -> bool {
        self.with_node(node, |n| n.reachable && n.can_ban)
            .unwrap_or(false)
    }

    async fn get_ban_record(
        &self,
        node: &NodeId,
        subject: &SubjectId,
    ) -> Result<Option<BanRecord>, GatewayError> {
        self.readable(node)?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.ban_reason(node, subject).map(|reason| BanRecord {
            subject: subject.clone(),
            origin_node: node.clone(),
            reason,
            observed_at_ms: current_timestamp_ms(),
        }))
    }

    async fn list_ban_records(&self, node: &NodeId) -> Result<Vec<BanRecord>, GatewayError> {
        self.readable(node)?;
        let observed_at_ms = current_timestamp_ms();
        Ok(self
            .with_node(node, |n| {
                n.bans
                    .iter()
                    .map(|(subject, reason)| BanRecord {
                        subject: subject.clone(),
                        origin_node: node.clone(),
                        reason: reason.clone(),
                        observed_at_ms,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn apply_ban(
        &self,
        node: &NodeId,
        subject: &SubjectId,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.writable(node)?;
        self.with_node(node, |n| {
            if n.ban(subject).is_none() {
                n.bans.push((subject.clone(), reason.to_string()));
            }
            n.members.remove(subject);
        });
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.emit_echo(BanEvent {
            node: node.clone(),
            subject: subject.clone(),
            reason: Some(reason.to_string()),
        });
        Ok(())
    }

    async fn remove_ban(
        &self,
        node: &NodeId,
        subject: &SubjectId,
        _reason: &str,
    ) -> Result<(), GatewayError> {
        self.writable(node)?;
        let removed = self
            .with_node(node, |n| {
                let before = n.bans.len();
                n.bans.retain(|(s, _)| s != subject);
                before != n.bans.len()
            })
            .unwrap_or(false);
        if !removed {
            return Err(GatewayError::Remote(format!("Unknown Ban: {subject}")));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_member(&self, node: &NodeId, subject: &SubjectId) -> Result<bool, GatewayError> {
        self.readable(node)?;
        Ok(self
            .with_node(node, |n| n.members.contains(subject))
            .unwrap_or(false))
    }
}
