//! Memory Manager: owns the record set, indexes, and graph mirrors
//!
//! All mutation paths run through this API so the indexes and the mirrored
//! graph nodes never diverge from the primary record set. Concurrent callers
//! serialize on the surrounding lock (see `MemorySystem`).

use crate::errors::{MemoryError, Result};
use crate::graph::{node_types, KnowledgeEdge, KnowledgeGraph, KnowledgeNode, NodePatch};
use crate::memory::index::MemoryIndexes;
use crate::memory::types::{Memory, MemoryContext, MemoryPatch, MemoryType, RetentionPolicy};
use crate::telemetry::{LifecycleEvent, TelemetryCollector};
use chrono::Utc;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Prefix for graph nodes mirroring memory records. The mirrored node id is
/// always `memory_<id>`, so it can be located without a side table.
pub const MEMORY_NODE_PREFIX: &str = "memory_";

/// Derive the mirrored node id for a memory id
pub fn memory_node_id(memory_id: &str) -> String {
    format!("{MEMORY_NODE_PREFIX}{memory_id}")
}

/// Memory manager configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Upper bound of the importance scale (1.0 or 10.0)
    pub importance_scale: f64,
    /// What happens to originals after consolidation
    pub retention_policy: RetentionPolicy,
    /// Cadence for the expired-memory sweep when auto-cleanup is enabled
    pub cleanup_interval: Duration,
    /// Capacity bound; stores are rejected once reached (no eviction)
    pub max_memories: Option<usize>,
    /// Whether `MemorySystem::spawn_auto_cleanup` is allowed to run
    pub auto_cleanup: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            importance_scale: 1.0,
            retention_policy: RetentionPolicy::default(),
            cleanup_interval: Duration::from_secs(60),
            auto_cleanup: true,
            max_memories: None,
        }
    }
}

/// Search filters; every provided filter narrows the result set
/// (intersection semantics).
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Any-match against the tag index
    pub tags: Vec<String>,
    /// Partial key/value match against stored context
    pub context: Option<MemoryContext>,
    /// Substring match against content (case-insensitive)
    pub text: Option<String>,
    /// Match against the keyword index
    pub keywords: Vec<String>,
}

impl SearchQuery {
    fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.context.is_none()
            && self.text.is_none()
            && self.keywords.is_empty()
    }
}

/// Store-level statistics
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub total_memories: usize,
    pub index_size: usize,
    pub type_stats: HashMap<MemoryType, usize>,
}

/// The memory record store
pub struct MemoryManager {
    memories: HashMap<String, Memory>,
    indexes: MemoryIndexes,
    graph: KnowledgeGraph,
    config: MemoryConfig,
    telemetry: TelemetryCollector,
}

impl MemoryManager {
    /// Create a manager with the given configuration
    pub fn new(config: MemoryConfig, telemetry: TelemetryCollector) -> Self {
        Self {
            memories: HashMap::new(),
            indexes: MemoryIndexes::new(),
            graph: KnowledgeGraph::new(),
            config,
            telemetry,
        }
    }

    /// Create a manager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(MemoryConfig::default(), TelemetryCollector::new())
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Store a new memory: validate, insert, index, mirror a graph node.
    pub fn store_memory(&mut self, memory: Memory) -> Result<bool> {
        self.validate(&memory)?;
        if self.memories.contains_key(&memory.id) {
            return Err(MemoryError::DuplicateId {
                id: memory.id.clone(),
            });
        }
        if let Some(cap) = self.config.max_memories {
            if self.memories.len() >= cap {
                return Err(MemoryError::Validation(format!(
                    "memory capacity {cap} reached"
                )));
            }
        }

        self.mirror_node(&memory)?;
        self.indexes.insert(&memory);
        let id = memory.id.clone();
        self.memories.insert(id.clone(), memory);

        self.telemetry.record(LifecycleEvent::MemoryStored {
            memory_id: id,
            timestamp: Utc::now(),
        });
        Ok(true)
    }

    /// Apply a partial update. Stale index postings are removed before the
    /// patched record is reindexed, so the indexes never hold duplicates.
    pub fn update_memory(&mut self, id: &str, patch: MemoryPatch) -> Result<()> {
        let existing = self.memories.get(id).ok_or_else(|| MemoryError::NotFound {
            id: id.to_string(),
        })?;

        let mut updated = existing.clone();
        if let Some(content) = patch.content {
            updated.content = content;
        }
        if let Some(summary) = patch.summary {
            updated.summary = Some(summary);
        }
        if let Some(memory_type) = patch.memory_type {
            updated.memory_type = memory_type;
        }
        if let Some(importance) = patch.importance {
            updated.importance = importance;
        }
        if let Some(tags) = patch.tags {
            updated.tags = tags;
        }
        if let Some(context) = patch.context {
            updated.context = context;
        }
        if let Some(expires_at) = patch.expires_at {
            updated.expires_at = expires_at;
        }
        updated.updated_at = Utc::now();
        self.validate(&updated)?;

        // Mirror refresh first; primary map and indexes stay untouched if
        // the graph invariant is somehow broken
        self.graph.update_node(
            &memory_node_id(id),
            NodePatch {
                label: Some(updated.display_label()),
                tags: Some(updated.tags.clone()),
                ..Default::default()
            },
        )?;

        // Old postings out first, keyed off the pre-update record
        let old = self.memories.remove(id).unwrap();
        self.indexes.remove(&old);
        self.indexes.insert(&updated);
        self.memories.insert(id.to_string(), updated);
        self.telemetry.record(LifecycleEvent::MemoryUpdated {
            memory_id: id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Remove a memory, its index postings, and its mirrored node.
    /// Idempotent: returns `false` when the id was never present.
    pub fn remove_memory(&mut self, id: &str) -> bool {
        let Some(memory) = self.memories.remove(id) else {
            return false;
        };
        self.indexes.remove(&memory);
        self.graph.remove_node(&memory_node_id(id));

        self.telemetry.record(LifecycleEvent::MemoryRemoved {
            memory_id: id.to_string(),
            timestamp: Utc::now(),
        });
        true
    }

    /// Retrieval read: returns the memory and bumps its access stats.
    /// Use [`peek_memory`](Self::peek_memory) for pure existence checks.
    pub fn get_memory(&mut self, id: &str) -> Option<&Memory> {
        let memory = self.memories.get_mut(id)?;
        memory.access_count += 1;
        memory.last_accessed_at = Utc::now();
        Some(memory)
    }

    /// Pure read without access-stat side effects
    pub fn peek_memory(&self, id: &str) -> Option<&Memory> {
        self.memories.get(id)
    }

    /// All stored memories, unordered
    pub fn get_all_memories(&self) -> Vec<&Memory> {
        self.memories.values().collect()
    }

    /// Memories of the given type, via the type index
    pub fn get_memories_by_type(&self, memory_type: MemoryType) -> Vec<&Memory> {
        self.indexes
            .ids_by_type(memory_type)
            .iter()
            .filter_map(|id| self.memories.get(id))
            .collect()
    }

    /// Filtered search; the result is the intersection of every provided
    /// filter. An empty query yields an empty result.
    pub fn search_memories(&self, query: &SearchQuery) -> Vec<&Memory> {
        if query.is_empty() {
            return Vec::new();
        }

        let mut candidates: Option<HashSet<String>> = None;

        let mut narrow = |ids: HashSet<String>, candidates: &mut Option<HashSet<String>>| {
            *candidates = Some(match candidates.take() {
                Some(existing) => existing.intersection(&ids).cloned().collect(),
                None => ids,
            });
        };

        if !query.tags.is_empty() {
            let ids = self
                .indexes
                .ids_by_any_tag(query.tags.iter().map(String::as_str));
            narrow(ids, &mut candidates);
        }

        if !query.keywords.is_empty() {
            let ids = self
                .indexes
                .ids_by_any_keyword(query.keywords.iter().map(String::as_str));
            narrow(ids, &mut candidates);
        }

        if let Some(text) = &query.text {
            let needle = text.to_lowercase();
            let ids: HashSet<String> = self
                .memories
                .values()
                .filter(|m| m.content.to_lowercase().contains(&needle))
                .map(|m| m.id.clone())
                .collect();
            narrow(ids, &mut candidates);
        }

        if let Some(context) = &query.context {
            let ids: HashSet<String> = self
                .memories
                .values()
                .filter(|m| m.context.matches(context))
                .map(|m| m.id.clone())
                .collect();
            narrow(ids, &mut candidates);
        }

        candidates
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.memories.get(id))
            .collect()
    }

    /// Store-level statistics; `type_stats` values sum to `total_memories`
    pub fn get_stats(&self) -> MemoryStats {
        let mut type_stats: HashMap<MemoryType, usize> = HashMap::new();
        for memory in self.memories.values() {
            *type_stats.entry(memory.memory_type).or_insert(0) += 1;
        }
        MemoryStats {
            total_memories: self.memories.len(),
            index_size: self.indexes.posting_count(),
            type_stats,
        }
    }

    /// Merge two or more memories into a new `Consolidated` record.
    ///
    /// Originals are retained with back links or removed, per the configured
    /// retention policy; kept originals gain a `consolidated_into` graph edge
    /// to the merged record's node.
    pub fn consolidate_memories(
        &mut self,
        source_ids: &[String],
        summary: Option<String>,
    ) -> Result<Memory> {
        if source_ids.len() < 2 {
            return Err(MemoryError::Validation(
                "consolidation requires at least two source memories".to_string(),
            ));
        }
        for id in source_ids {
            if !self.memories.contains_key(id) {
                return Err(MemoryError::NotFound { id: id.clone() });
            }
        }

        let mut merged_content = Vec::new();
        let mut merged_tags = std::collections::BTreeSet::new();
        let mut max_importance: f64 = 0.0;
        for id in source_ids {
            let source = &self.memories[id];
            merged_content.push(source.content.clone());
            merged_tags.extend(source.tags.iter().cloned());
            max_importance = max_importance.max(source.importance);
        }

        let mut consolidated = Memory::new(merged_content.join("\n"), MemoryType::Consolidated)
            .with_importance(max_importance);
        consolidated.summary = summary;
        consolidated.tags = merged_tags;
        consolidated.consolidated = true;
        consolidated.consolidated_from = source_ids.to_vec();

        let consolidated_id = consolidated.id.clone();
        self.store_memory(consolidated)?;

        match self.config.retention_policy {
            RetentionPolicy::RemoveOriginals => {
                for id in source_ids {
                    self.remove_memory(id);
                }
            }
            RetentionPolicy::KeepWithBackLink => {
                for id in source_ids {
                    if let Some(source) = self.memories.get_mut(id) {
                        source.consolidated = true;
                        source.consolidated_into = Some(consolidated_id.clone());
                        source.updated_at = Utc::now();
                    }
                    self.graph.add_edge(KnowledgeEdge::new(
                        memory_node_id(id),
                        memory_node_id(&consolidated_id),
                        "consolidated_into",
                    ))?;
                }
            }
        }

        self.telemetry.record(LifecycleEvent::MemoryConsolidated {
            memory_id: consolidated_id.clone(),
            source_count: source_ids.len(),
            timestamp: Utc::now(),
        });
        Ok(self.memories[&consolidated_id].clone())
    }

    /// Remove every memory whose `expires_at` lies in the past, through the
    /// normal removal path so indexes and graph stay consistent.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .memories
            .values()
            .filter(|m| m.is_expired(now))
            .map(|m| m.id.clone())
            .collect();

        for id in &expired {
            self.remove_memory(id);
            self.telemetry.record(LifecycleEvent::MemoryExpired {
                memory_id: id.clone(),
                timestamp: now,
            });
        }
        expired.len()
    }

    /// Create a typed relationship between the mirrored nodes of two
    /// memories. Fails with `DanglingReference` when either is absent.
    pub fn relate_memories(
        &mut self,
        from_id: &str,
        to_id: &str,
        edge_type: &str,
        weight: f64,
    ) -> Result<String> {
        let edge = KnowledgeEdge::new(memory_node_id(from_id), memory_node_id(to_id), edge_type)
            .with_weight(weight);
        let edge_id = edge.id.clone();
        self.graph.add_edge(edge)?;
        Ok(edge_id)
    }

    /// Shared view of the knowledge graph
    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// Mutable graph access for caller-defined nodes and relationships
    pub fn graph_mut(&mut self) -> &mut KnowledgeGraph {
        &mut self.graph
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    /// Replace all records from a loaded snapshot and rebuild the derived
    /// state (indexes and graph mirrors) from scratch.
    pub(crate) fn replace_records(&mut self, records: Vec<Memory>) {
        self.memories = records.into_iter().map(|m| (m.id.clone(), m)).collect();
        self.rebuild_derived_state();
    }

    /// Snapshot of the raw records for persistence
    pub(crate) fn records(&self) -> Vec<Memory> {
        self.memories.values().cloned().collect()
    }

    /// Recompute indexes and mirrored nodes from the primary records.
    /// Pre-sizes nothing clever; correctness over speed, postings are
    /// derived, never trusted from serialized form.
    fn rebuild_derived_state(&mut self) {
        self.indexes.clear();
        self.graph.clear();
        let records: Vec<Memory> = self.memories.values().cloned().collect();
        for memory in &records {
            self.indexes.insert(memory);
            // Records came from the primary map, so mirroring cannot collide
            let _ = self.mirror_node(memory);
        }
    }

    fn validate(&self, memory: &Memory) -> Result<()> {
        if memory.content.trim().is_empty() {
            return Err(MemoryError::Validation(
                "memory content must not be empty".to_string(),
            ));
        }
        if memory.importance < 0.0 || memory.importance > self.config.importance_scale {
            return Err(MemoryError::Validation(format!(
                "importance {} outside scale 0..={}",
                memory.importance, self.config.importance_scale
            )));
        }
        Ok(())
    }

    fn mirror_node(&mut self, memory: &Memory) -> Result<()> {
        let node = KnowledgeNode::new(
            memory_node_id(&memory.id),
            memory.display_label(),
            node_types::MEMORY,
        )
        .with_property("memory_id", json!(memory.id))
        .with_tags(memory.tags.iter().cloned());
        self.graph.add_node(node)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn manager() -> MemoryManager {
        MemoryManager::with_defaults()
    }

    fn semantic(content: &str, tags: &[&str]) -> Memory {
        Memory::new(content, MemoryType::Semantic).with_tags(tags.iter().copied())
    }

    #[test]
    fn test_store_validates_content() {
        let mut mgr = manager();
        let err = mgr
            .store_memory(Memory::new("   ", MemoryType::Working))
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }

    #[test]
    fn test_capacity_bound_rejects_then_frees_on_removal() {
        let mut mgr = MemoryManager::new(
            MemoryConfig {
                max_memories: Some(2),
                ..MemoryConfig::default()
            },
            TelemetryCollector::new(),
        );
        mgr.store_memory(semantic("first note", &[])).unwrap();
        let second = semantic("second note", &[]);
        let second_id = second.id.clone();
        mgr.store_memory(second).unwrap();

        let err = mgr.store_memory(semantic("third note", &[])).unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
        assert_eq!(mgr.get_stats().total_memories, 2);

        // Removal frees a slot
        assert!(mgr.remove_memory(&second_id));
        mgr.store_memory(semantic("third note", &[])).unwrap();
        assert_eq!(mgr.get_stats().total_memories, 2);
    }

    #[test]
    fn test_store_validates_importance_scale() {
        let mut mgr = manager();
        let err = mgr
            .store_memory(semantic("x y z", &[]).with_importance(2.0))
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));

        let mut tens = MemoryManager::new(
            MemoryConfig {
                importance_scale: 10.0,
                ..Default::default()
            },
            TelemetryCollector::new(),
        );
        assert!(tens
            .store_memory(semantic("scaled importance", &[]).with_importance(7.5))
            .unwrap());
    }

    #[test]
    fn test_store_mirrors_graph_node() {
        let mut mgr = manager();
        let memory = semantic("graph mirroring works", &["graph"]);
        let id = memory.id.clone();
        mgr.store_memory(memory).unwrap();

        let node = mgr.graph().get_node(&memory_node_id(&id)).unwrap();
        assert_eq!(node.node_type, node_types::MEMORY);
        assert!(node.tags.contains("graph"));
    }

    #[test]
    fn test_update_reindexes_without_stale_postings() {
        let mut mgr = manager();
        let memory = semantic("enforce code style", &["style"]);
        let id = memory.id.clone();
        mgr.store_memory(memory).unwrap();

        mgr.update_memory(
            &id,
            MemoryPatch {
                tags: Some(["style".to_string(), "lint".to_string()].into_iter().collect()),
                ..Default::default()
            },
        )
        .unwrap();

        let hits = mgr.search_memories(&SearchQuery {
            tags: vec!["lint".to_string()],
            ..Default::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);

        let misses = mgr.search_memories(&SearchQuery {
            tags: vec!["nonexistent".to_string()],
            ..Default::default()
        });
        assert!(misses.is_empty());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut mgr = manager();
        let err = mgr.update_memory("ghost", MemoryPatch::default()).unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { .. }));
    }

    #[test]
    fn test_remove_is_idempotent_and_cleans_graph() {
        let mut mgr = manager();
        let memory = semantic("ephemeral note", &[]);
        let id = memory.id.clone();
        mgr.store_memory(memory).unwrap();

        assert!(mgr.remove_memory(&id));
        assert!(!mgr.remove_memory(&id));
        assert!(mgr.graph().get_node(&memory_node_id(&id)).is_none());
        assert_eq!(mgr.get_stats().index_size, 0);
    }

    #[test]
    fn test_get_memory_bumps_access_stats() {
        let mut mgr = manager();
        let memory = semantic("frequently read", &[]);
        let id = memory.id.clone();
        mgr.store_memory(memory).unwrap();

        mgr.get_memory(&id);
        mgr.get_memory(&id);
        assert_eq!(mgr.peek_memory(&id).unwrap().access_count, 2);

        // peek does not bump
        mgr.peek_memory(&id);
        assert_eq!(mgr.peek_memory(&id).unwrap().access_count, 2);
    }

    #[test]
    fn test_search_intersection_semantics() {
        let mut mgr = manager();
        mgr.store_memory(semantic("rust ownership rules", &["rust"])).unwrap();
        let both = semantic("rust async patterns explained", &["rust", "async"]);
        let both_id = both.id.clone();
        mgr.store_memory(both).unwrap();

        let hits = mgr.search_memories(&SearchQuery {
            tags: vec!["rust".to_string()],
            text: Some("async".to_string()),
            ..Default::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, both_id);

        // Empty query returns nothing, not everything
        assert!(mgr.search_memories(&SearchQuery::default()).is_empty());
    }

    #[test]
    fn test_stats_type_counts_sum_to_total() {
        let mut mgr = manager();
        mgr.store_memory(Memory::new("alpha fact", MemoryType::Semantic)).unwrap();
        mgr.store_memory(Memory::new("beta event", MemoryType::Episodic)).unwrap();
        mgr.store_memory(Memory::new("gamma fact", MemoryType::Semantic)).unwrap();

        let stats = mgr.get_stats();
        assert_eq!(stats.total_memories, 3);
        assert_eq!(stats.type_stats.values().sum::<usize>(), stats.total_memories);
        assert_eq!(stats.type_stats[&MemoryType::Semantic], 2);
    }

    #[test]
    fn test_consolidation_keeps_back_links() {
        let mut mgr = manager();
        let a = semantic("first fragment", &["merge"]);
        let b = semantic("second fragment", &["merge"]);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        mgr.store_memory(a).unwrap();
        mgr.store_memory(b).unwrap();

        let merged = mgr
            .consolidate_memories(&[a_id.clone(), b_id.clone()], Some("both fragments".to_string()))
            .unwrap();

        assert_eq!(merged.memory_type, MemoryType::Consolidated);
        assert_eq!(merged.consolidated_from, vec![a_id.clone(), b_id.clone()]);

        let original = mgr.peek_memory(&a_id).unwrap();
        assert!(original.consolidated);
        assert_eq!(original.consolidated_into.as_deref(), Some(merged.id.as_str()));

        // Back-link edge exists in the graph
        let adjacent = mgr
            .graph()
            .get_adjacent(&memory_node_id(&a_id), crate::graph::Direction::Outgoing);
        assert!(adjacent.contains(&memory_node_id(&merged.id)));
    }

    #[test]
    fn test_consolidation_remove_originals_policy() {
        let mut mgr = MemoryManager::new(
            MemoryConfig {
                retention_policy: RetentionPolicy::RemoveOriginals,
                ..Default::default()
            },
            TelemetryCollector::new(),
        );
        let a = semantic("gone after merge", &[]);
        let b = semantic("also gone", &[]);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        mgr.store_memory(a).unwrap();
        mgr.store_memory(b).unwrap();

        mgr.consolidate_memories(&[a_id.clone(), b_id], None).unwrap();
        assert!(mgr.peek_memory(&a_id).is_none());
        assert_eq!(mgr.get_stats().total_memories, 1);
    }

    #[test]
    fn test_cleanup_expired_goes_through_removal_path() {
        let mut mgr = manager();
        let stale = semantic("will expire", &["old"])
            .with_expiry(Utc::now() - ChronoDuration::seconds(5));
        let stale_id = stale.id.clone();
        mgr.store_memory(stale).unwrap();
        mgr.store_memory(semantic("stays around", &[])).unwrap();

        assert_eq!(mgr.cleanup_expired(), 1);
        assert!(mgr.peek_memory(&stale_id).is_none());
        assert!(mgr.graph().get_node(&memory_node_id(&stale_id)).is_none());
        assert!(mgr.search_memories(&SearchQuery {
            tags: vec!["old".to_string()],
            ..Default::default()
        })
        .is_empty());
    }

    #[test]
    fn test_relate_memories() {
        let mut mgr = manager();
        let a = semantic("cause", &[]);
        let b = semantic("effect", &[]);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        mgr.store_memory(a).unwrap();
        mgr.store_memory(b).unwrap();

        mgr.relate_memories(&a_id, &b_id, "caused", 0.8).unwrap();
        let adjacent = mgr
            .graph()
            .get_adjacent(&memory_node_id(&a_id), crate::graph::Direction::Outgoing);
        assert_eq!(adjacent, vec![memory_node_id(&b_id)]);

        let err = mgr.relate_memories(&a_id, "ghost", "caused", 1.0).unwrap_err();
        assert!(matches!(err, MemoryError::DanglingReference { .. }));
    }

    #[test]
    fn test_index_graph_consistency_invariant() {
        let mut mgr = manager();
        let ids: Vec<String> = (0..5)
            .map(|i| {
                let m = semantic(&format!("fact number {i}"), &["bulk"]);
                let id = m.id.clone();
                mgr.store_memory(m).unwrap();
                id
            })
            .collect();
        mgr.remove_memory(&ids[1]);
        mgr.update_memory(
            &ids[2],
            MemoryPatch {
                content: Some("rewritten fact".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let stats = mgr.get_stats();
        assert_eq!(stats.total_memories, 4);
        assert_eq!(stats.type_stats.values().sum::<usize>(), 4);

        // Every memory has exactly one mirrored node and vice versa
        let memory_nodes = mgr
            .graph()
            .nodes()
            .filter(|n| n.node_type == node_types::MEMORY)
            .count();
        assert_eq!(memory_nodes, 4);
        for memory in mgr.get_all_memories() {
            assert!(mgr.graph().get_node(&memory_node_id(&memory.id)).is_some());
        }
    }
}
