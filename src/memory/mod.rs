//! Memory store: typed records, secondary indexes, retrieval, persistence
//!
//! Components:
//! - Types: memory records, context, patches, retention policy
//! - Indexes: type/tag/keyword postings (derived state)
//! - Manager: CRUD, search, consolidation, graph mirroring
//! - Retrieval: deterministic lexical scoring and ranking
//! - Persistence: versioned whole-blob snapshots

pub mod index;
pub mod manager;
pub mod persistence;
pub mod retrieval;
pub mod types;

pub use manager::{memory_node_id, MemoryConfig, MemoryManager, MemoryStats, SearchQuery};
pub use persistence::{MemorySnapshot, MemoryStore, PersistenceConfig, SCHEMA_VERSION};
pub use retrieval::{MemoryRetrieval, RetrievalConfig, RetrievalQuery, RetrievalResult, SortOrder};
pub use types::{Memory, MemoryContext, MemoryPatch, MemoryType, RetentionPolicy};
