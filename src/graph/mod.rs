//! Knowledge Graph: labeled node/edge store
//!
//! Mirrors memories as nodes and holds caller-defined relationships.
//! Adjacency queries are O(degree) via per-node edge indexes.

pub mod store;
pub mod types;

pub use store::{Direction, GraphSnapshot, KnowledgeGraph};
pub use types::{node_types, KnowledgeEdge, KnowledgeNode, NodePatch};
