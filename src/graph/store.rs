//! Graph store with O(degree) adjacency and snapshot round-trip

use crate::errors::{MemoryError, Result};
use crate::graph::types::{KnowledgeEdge, KnowledgeNode, NodePatch};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Adjacency direction for neighbor queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Serializable full-graph snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeEdge>,
}

/// In-memory knowledge graph.
///
/// Removing a node cascades to every edge where it is source or target;
/// orphaned edges are never retained.
pub struct KnowledgeGraph {
    nodes: HashMap<String, KnowledgeNode>,
    edges: HashMap<String, KnowledgeEdge>,
    /// node id -> ids of edges leaving it
    outgoing: HashMap<String, HashSet<String>>,
    /// node id -> ids of edges entering it
    incoming: HashMap<String, HashSet<String>>,
}

impl KnowledgeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        }
    }

    /// Insert a node; fails if the id already exists
    pub fn add_node(&mut self, node: KnowledgeNode) -> Result<&KnowledgeNode> {
        if self.nodes.contains_key(&node.id) {
            return Err(MemoryError::DuplicateId {
                id: node.id.clone(),
            });
        }
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        Ok(self.nodes.get(&id).unwrap())
    }

    /// Look up a node; absence is a normal outcome
    pub fn get_node(&self, id: &str) -> Option<&KnowledgeNode> {
        self.nodes.get(id)
    }

    /// Merge patch fields into an existing node, bumping `updated_at`
    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<&KnowledgeNode> {
        let node = self.nodes.get_mut(id).ok_or_else(|| MemoryError::NotFound {
            id: id.to_string(),
        })?;

        if let Some(label) = patch.label {
            node.label = label;
        }
        if let Some(node_type) = patch.node_type {
            node.node_type = node_type;
        }
        if let Some(properties) = patch.properties {
            node.properties.extend(properties);
        }
        if let Some(tags) = patch.tags {
            node.tags = tags;
        }
        node.updated_at = Utc::now();
        Ok(node)
    }

    /// Remove a node and every edge referencing it. Idempotent: removing
    /// an absent id returns `false`, not an error.
    pub fn remove_node(&mut self, id: &str) -> bool {
        if self.nodes.remove(id).is_none() {
            return false;
        }

        let mut stale: HashSet<String> = HashSet::new();
        if let Some(edge_ids) = self.outgoing.remove(id) {
            stale.extend(edge_ids);
        }
        if let Some(edge_ids) = self.incoming.remove(id) {
            stale.extend(edge_ids);
        }
        for edge_id in stale {
            self.detach_edge(&edge_id);
        }
        true
    }

    /// Insert an edge; both endpoints must exist
    pub fn add_edge(&mut self, edge: KnowledgeEdge) -> Result<&KnowledgeEdge> {
        if self.edges.contains_key(&edge.id) {
            return Err(MemoryError::DuplicateId {
                id: edge.id.clone(),
            });
        }
        for endpoint in [&edge.source_id, &edge.target_id] {
            if !self.nodes.contains_key(endpoint) {
                return Err(MemoryError::DanglingReference {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }

        let id = edge.id.clone();
        self.outgoing
            .entry(edge.source_id.clone())
            .or_default()
            .insert(id.clone());
        self.incoming
            .entry(edge.target_id.clone())
            .or_default()
            .insert(id.clone());
        self.edges.insert(id.clone(), edge);
        Ok(self.edges.get(&id).unwrap())
    }

    /// Look up an edge
    pub fn get_edge(&self, id: &str) -> Option<&KnowledgeEdge> {
        self.edges.get(id)
    }

    /// Remove an edge. Idempotent.
    pub fn remove_edge(&mut self, id: &str) -> bool {
        if !self.edges.contains_key(id) {
            return false;
        }
        self.detach_edge(id);
        true
    }

    /// Neighbor node ids in the given direction, deduplicated.
    /// O(degree) via the per-node edge indexes.
    pub fn get_adjacent(&self, id: &str, direction: Direction) -> Vec<String> {
        let mut neighbors: HashSet<String> = HashSet::new();

        if matches!(direction, Direction::Outgoing | Direction::Both) {
            if let Some(edge_ids) = self.outgoing.get(id) {
                for edge_id in edge_ids {
                    if let Some(edge) = self.edges.get(edge_id) {
                        neighbors.insert(edge.target_id.clone());
                    }
                }
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            if let Some(edge_ids) = self.incoming.get(id) {
                for edge_id in edge_ids {
                    if let Some(edge) = self.edges.get(edge_id) {
                        neighbors.insert(edge.source_id.clone());
                    }
                }
            }
        }

        neighbors.into_iter().collect()
    }

    /// Edges leaving a node
    pub fn outgoing_edges(&self, id: &str) -> Vec<&KnowledgeEdge> {
        self.outgoing
            .get(id)
            .map(|edge_ids| {
                edge_ids
                    .iter()
                    .filter_map(|edge_id| self.edges.get(edge_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterate over all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &KnowledgeNode> {
        self.nodes.values()
    }

    /// Drop all nodes and edges
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.outgoing.clear();
        self.incoming.clear();
    }

    /// Full serializable copy of the graph
    pub fn export_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
        }
    }

    /// Replace graph contents from a snapshot, rebuilding adjacency.
    /// Fails without modifying the graph if the snapshot is inconsistent.
    pub fn import_snapshot(&mut self, snapshot: GraphSnapshot) -> Result<()> {
        let mut rebuilt = KnowledgeGraph::new();
        for node in snapshot.nodes {
            rebuilt.add_node(node)?;
        }
        for edge in snapshot.edges {
            rebuilt.add_edge(edge)?;
        }
        *self = rebuilt;
        Ok(())
    }

    /// Remove an edge from both adjacency indexes and the edge map
    fn detach_edge(&mut self, edge_id: &str) {
        if let Some(edge) = self.edges.remove(edge_id) {
            if let Some(set) = self.outgoing.get_mut(&edge.source_id) {
                set.remove(edge_id);
                if set.is_empty() {
                    self.outgoing.remove(&edge.source_id);
                }
            }
            if let Some(set) = self.incoming.get_mut(&edge.target_id) {
                set.remove(edge_id);
                if set.is_empty() {
                    self.incoming.remove(&edge.target_id);
                }
            }
        }
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}
