//! Snapshot persistence for the memory store
//!
//! Whole-blob JSON semantics: memories are serialized with ISO-8601 dates,
//! indexes and graph mirrors are derived state and never persisted. Saves
//! write to a temp file and atomically rename so a failed save cannot
//! corrupt the existing snapshot; a failed load leaves the in-memory store
//! in its prior state.

use crate::errors::{MemoryError, Result};
use crate::memory::manager::MemoryManager;
use crate::memory::types::Memory;
use crate::telemetry::LifecycleEvent;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Snapshot schema version; loads reject anything else
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Persisted snapshot layout
#[derive(Debug, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub version: String,
    pub memories: Vec<Memory>,
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Snapshot file location
    pub path: PathBuf,
}

impl PersistenceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Flat-file persistence sink
pub struct MemoryStore {
    config: PersistenceConfig,
}

impl MemoryStore {
    pub fn new(config: PersistenceConfig) -> Self {
        Self { config }
    }

    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }

    /// Serialize the full memory set and atomically replace the snapshot
    pub async fn save(&self, manager: &MemoryManager) -> Result<()> {
        let snapshot = MemorySnapshot {
            version: SCHEMA_VERSION.to_string(),
            memories: manager.records(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    MemoryError::Persistence(format!("failed to create snapshot directory: {e}"))
                })?;
            }
        }

        let tmp_path = self.config.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| MemoryError::Persistence(format!("failed to write snapshot: {e}")))?;
        tokio::fs::rename(&tmp_path, &self.config.path)
            .await
            .map_err(|e| MemoryError::Persistence(format!("failed to replace snapshot: {e}")))?;

        manager.telemetry().record(LifecycleEvent::SnapshotSaved {
            memory_count: snapshot.memories.len(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Load the snapshot, fully parsing and version-checking it before the
    /// manager's records are replaced and derived state rebuilt.
    pub async fn load(&self, manager: &mut MemoryManager) -> Result<usize> {
        let json = tokio::fs::read_to_string(&self.config.path)
            .await
            .map_err(|e| MemoryError::Persistence(format!("failed to read snapshot: {e}")))?;

        let snapshot: MemorySnapshot = serde_json::from_str(&json)
            .map_err(|e| MemoryError::Persistence(format!("failed to parse snapshot: {e}")))?;

        if snapshot.version != SCHEMA_VERSION {
            return Err(MemoryError::Persistence(format!(
                "unsupported snapshot version {:?}, expected {:?}",
                snapshot.version, SCHEMA_VERSION
            )));
        }

        let count = snapshot.memories.len();
        manager.replace_records(snapshot.memories);

        manager.telemetry().record(LifecycleEvent::SnapshotLoaded {
            memory_count: count,
            timestamp: Utc::now(),
        });
        Ok(count)
    }
}
