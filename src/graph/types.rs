//! Node and edge types for the knowledge graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Recommended node type labels. `KnowledgeNode::node_type` stays an open
/// string so callers can introduce domain-specific types at runtime.
pub mod node_types {
    pub const MEMORY: &str = "memory";
    pub const CONCEPT: &str = "concept";
    pub const ENTITY: &str = "entity";
}

/// A graph vertex
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    /// Unique node identifier
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Open type label, see [`node_types`]
    #[serde(rename = "type")]
    pub node_type: String,
    /// Open property map
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    /// Node tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeNode {
    /// Create a node with current timestamps
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            label: label.into(),
            node_type: node_type.into(),
            properties: HashMap::new(),
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a property
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Attach tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial update for a node; `None` fields are left untouched.
/// Provided `properties` are merged key-by-key into the existing map.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub label: Option<String>,
    pub node_type: Option<String>,
    pub properties: Option<HashMap<String, Value>>,
    pub tags: Option<BTreeSet<String>>,
}

/// A directed, typed, weighted edge between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    /// Unique edge identifier
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    /// Relationship label, e.g. "consolidated_into", "related_to"
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Relationship strength
    pub weight: f64,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

impl KnowledgeEdge {
    /// Create an edge with a generated id and weight 1.0
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type: edge_type.into(),
            weight: 1.0,
            properties: HashMap::new(),
        }
    }

    /// Override the weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_builder() {
        let node = KnowledgeNode::new("n1", "Rust", node_types::CONCEPT)
            .with_property("domain", serde_json::json!("programming"))
            .with_tags(["lang", "systems"]);

        assert_eq!(node.id, "n1");
        assert_eq!(node.node_type, "concept");
        assert!(node.tags.contains("systems"));
        assert_eq!(node.created_at, node.updated_at);
    }

    #[test]
    fn test_edge_defaults() {
        let edge = KnowledgeEdge::new("a", "b", "related_to");
        assert_eq!(edge.weight, 1.0);
        assert!(!edge.id.is_empty());
    }
}
