//! Error types for the mnemo memory subsystem
//!
//! Provides the full error taxonomy with context propagation.
//! Read operations on missing ids return `Option`/empty results; write
//! operations on missing ids fail with `NotFound`.

use thiserror::Error;

/// Main error type for the memory subsystem
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Malformed input to store/update
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Mutation on a missing id
    #[error("Not found: {id}")]
    NotFound { id: String },

    /// Graph node or edge id collision
    #[error("Duplicate id: {id}")]
    DuplicateId { id: String },

    /// Edge referencing a missing node
    #[error("Edge {edge_id} references missing node {node_id}")]
    DanglingReference { edge_id: String, node_id: String },

    /// Chain exceeded its time budget
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Conditional-rule expression failed to parse or evaluate
    #[error("Expression error: {0}")]
    Expression(String),

    /// Save/load I/O or schema-version failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal errors, wrapped with their original cause
    #[error("Memory system error: {0}")]
    Generic(String),
}

/// Result type alias for memory subsystem operations
pub type Result<T> = std::result::Result<T, MemoryError>;

impl From<anyhow::Error> for MemoryError {
    fn from(err: anyhow::Error) -> Self {
        MemoryError::Generic(format!("{err:#}"))
    }
}
