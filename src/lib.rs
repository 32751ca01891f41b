//! Mnemo - Long-Term Memory Subsystem
//!
//! A structured memory store with a knowledge graph, deterministic
//! lexical retrieval, and an event-driven rule system.
//!
//! # Architecture
//!
//! - **Memory**: typed records, secondary indexes, retrieval, persistence
//! - **Graph**: knowledge nodes and edges mirrored from memories
//! - **Rules**: engine, chains, conditional rules, dynamic generation

pub mod errors;
pub mod events;
pub mod graph;
pub mod memory;
pub mod rules;
pub mod system;
pub mod telemetry;

// Re-export commonly used types
pub use errors::{MemoryError, Result};
pub use events::{EventContext, Severity, SystemEvent};
pub use memory::{Memory, MemoryManager, MemoryType};
pub use rules::{Rule, RuleEngine, RuleProcessor};
pub use system::{MemorySystem, SystemConfig};
pub use telemetry::{LifecycleEvent, TelemetryCollector};
