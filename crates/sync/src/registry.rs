//! Static table of the nodes taking part in replication.
//!
//! Built once from configuration. Iteration order is the configured order and
//! drives the deterministic fan-out order of every engine.

use banmesh_core::{NodeConfig, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{SyncError, SyncResult};

/// One remote node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node identity
    pub id: NodeId,
    /// Human readable name
    pub display_name: String,
    /// Channel that receives reports for this node
    pub log_sink: Option<String>,
}

impl From<NodeConfig> for Node {
    fn from(config: NodeConfig) -> Self {
        Self {
            id: config.id,
            display_name: config.display_name,
            log_sink: config.log_sink,
        }
    }
}

/// Immutable, ordered node table
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
}

impl NodeRegistry {
    /// Build a registry, rejecting duplicate ids
    pub fn new(nodes: Vec<Node>) -> SyncResult<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), position).is_some() {
                return Err(SyncError::Registry(format!("duplicate node id {}", node.id)));
            }
        }
        Ok(Self { nodes, index })
    }

    /// Build from configuration entries
    pub fn from_config(configs: &[NodeConfig]) -> SyncResult<Self> {
        Self::new(configs.iter().cloned().map(Node::from).collect())
    }

    /// Nodes in registry order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Look up a node
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Look up a node or fail with [`SyncError::UnknownNode`]
    pub fn require(&self, id: &NodeId) -> SyncResult<&Node> {
        self.get(id).ok_or_else(|| SyncError::UnknownNode(id.clone()))
    }

    /// Display name, falling back to the raw id for unknown nodes
    pub fn display_name(&self, id: &NodeId) -> String {
        self.get(id)
            .map(|n| n.display_name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes are registered
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
