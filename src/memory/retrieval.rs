//! Memory retrieval: filter, score, rank, and graph expansion
//!
//! Scoring is a deterministic lexical function with fixed, documented
//! weights; no embedding model is involved. Equal scores tie-break by
//! `created_at` descending.

use crate::graph::{node_types, Direction, KnowledgeNode};
use crate::memory::index::tokenize;
use crate::memory::manager::{memory_node_id, MemoryManager};
use crate::memory::types::{Memory, MemoryContext, MemoryType};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Instant;

/// Fixed scoring weights. Keyword overlap dominates; the recency factor
/// only contributes under `SortOrder::Recency`.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Weight of the keyword-overlap ratio
    pub keyword_weight: f64,
    /// Weight of the tag-match ratio
    pub tag_weight: f64,
    /// Weight of the recency decay factor
    pub recency_weight: f64,
    /// Half-life of the recency decay, in seconds (default 7 days)
    pub recency_half_life_secs: f64,
    /// Top-K memories expanded through the graph when `include_related`
    pub related_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 0.6,
            tag_weight: 0.25,
            recency_weight: 0.15,
            recency_half_life_secs: 7.0 * 24.0 * 3600.0,
            related_top_k: 5,
        }
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Relevance,
    Importance,
    Recency,
}

/// Retrieval query: free text plus optional hard filters
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    pub text: String,
    pub memory_type: Option<MemoryType>,
    pub context: Option<MemoryContext>,
    pub tags: Vec<String>,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub importance_range: Option<(f64, f64)>,
    pub limit: usize,
    pub sort_by: SortOrder,
    pub include_related: bool,
}

impl RetrievalQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            memory_type: None,
            context: None,
            tags: Vec::new(),
            time_range: None,
            importance_range: None,
            limit: 10,
            sort_by: SortOrder::Relevance,
            include_related: false,
        }
    }
}

/// Ranked retrieval output
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub memories: Vec<Memory>,
    pub related_nodes: Vec<KnowledgeNode>,
    /// Top result's score clamped to [0, 1]; 0.0 when nothing matched
    pub confidence: f64,
    pub search_time_ms: u64,
    /// Filtered-candidate count before `limit` truncation
    pub total_results: usize,
}

/// Retrieval engine over a memory manager
pub struct MemoryRetrieval {
    config: RetrievalConfig,
}

impl MemoryRetrieval {
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
        }
    }

    pub fn with_config(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Run a query: hard filters, lexical scoring, ranking, optional
    /// one-hop graph expansion. Returned memories get an access-stat bump.
    pub fn retrieve(&self, manager: &mut MemoryManager, query: &RetrievalQuery) -> RetrievalResult {
        let started = Instant::now();
        let now = Utc::now();
        let query_tokens = tokenize(&query.text);

        let mut scored: Vec<(f64, Memory)> = manager
            .get_all_memories()
            .into_iter()
            .filter(|m| self.passes_filters(m, query))
            .map(|m| (self.score(m, query, &query_tokens, now), m.clone()))
            .collect();

        // When text was given, zero-overlap candidates only survive if a
        // tag or filter matched them; text-only queries drop them.
        if !query_tokens.is_empty() && query.tags.is_empty() {
            scored.retain(|(score, _)| *score > 0.0);
        }

        let total_results = scored.len();
        match query.sort_by {
            SortOrder::Relevance | SortOrder::Recency => {
                scored.sort_by(|a, b| {
                    b.0.partial_cmp(&a.0)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| b.1.created_at.cmp(&a.1.created_at))
                });
            }
            SortOrder::Importance => {
                scored.sort_by(|a, b| {
                    b.1.importance
                        .partial_cmp(&a.1.importance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| b.1.created_at.cmp(&a.1.created_at))
                });
            }
        }

        let confidence = scored
            .first()
            .map(|(score, _)| score.clamp(0.0, 1.0))
            .unwrap_or(0.0);

        scored.truncate(query.limit);

        let related_nodes = if query.include_related {
            self.collect_related(manager, &scored)
        } else {
            Vec::new()
        };

        // Retrieval reads bump access stats
        let memories: Vec<Memory> = scored.into_iter().map(|(_, m)| m).collect();
        for memory in &memories {
            manager.get_memory(&memory.id);
        }

        RetrievalResult {
            memories,
            related_nodes,
            confidence,
            search_time_ms: started.elapsed().as_millis() as u64,
            total_results,
        }
    }

    fn passes_filters(&self, memory: &Memory, query: &RetrievalQuery) -> bool {
        if let Some(memory_type) = query.memory_type {
            if memory.memory_type != memory_type {
                return false;
            }
        }
        if !query.tags.is_empty() && !query.tags.iter().any(|t| memory.tags.contains(t)) {
            return false;
        }
        if let Some((from, to)) = query.time_range {
            if memory.created_at < from || memory.created_at > to {
                return false;
            }
        }
        if let Some((min, max)) = query.importance_range {
            if memory.importance < min || memory.importance > max {
                return false;
            }
        }
        if let Some(context) = &query.context {
            if !memory.context.matches(context) {
                return false;
            }
        }
        true
    }

    /// score = keyword_weight * overlap_ratio + tag_weight * tag_ratio
    ///       (+ recency_weight * decay under SortOrder::Recency)
    fn score(
        &self,
        memory: &Memory,
        query: &RetrievalQuery,
        query_tokens: &[String],
        now: DateTime<Utc>,
    ) -> f64 {
        let keyword_score = if query_tokens.is_empty() {
            0.0
        } else {
            // Overlap against the tokenized content, not raw substrings
            let memory_tokens: HashSet<String> = tokenize(&memory.content).into_iter().collect();
            let overlap = query_tokens
                .iter()
                .filter(|t| memory_tokens.contains(*t))
                .count();
            overlap as f64 / query_tokens.len() as f64
        };

        let tag_score = if query.tags.is_empty() {
            0.0
        } else {
            let matched = query.tags.iter().filter(|t| memory.tags.contains(*t)).count();
            matched as f64 / query.tags.len() as f64
        };

        let mut score =
            self.config.keyword_weight * keyword_score + self.config.tag_weight * tag_score;

        if query.sort_by == SortOrder::Recency {
            let age_secs = (now - memory.created_at).num_seconds().max(0) as f64;
            let decay = 0.5f64.powf(age_secs / self.config.recency_half_life_secs);
            score += self.config.recency_weight * decay;
        }

        score
    }

    /// One hop from each top-K memory's mirrored node; adjacent non-memory
    /// nodes, deduplicated by id.
    fn collect_related(
        &self,
        manager: &MemoryManager,
        scored: &[(f64, Memory)],
    ) -> Vec<KnowledgeNode> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut related = Vec::new();

        for (_, memory) in scored.iter().take(self.config.related_top_k) {
            let node_id = memory_node_id(&memory.id);
            for neighbor_id in manager.graph().get_adjacent(&node_id, Direction::Both) {
                if let Some(node) = manager.graph().get_node(&neighbor_id) {
                    if node.node_type != node_types::MEMORY && seen.insert(node.id.clone()) {
                        related.push(node.clone());
                    }
                }
            }
        }

        related
    }
}

impl Default for MemoryRetrieval {
    fn default() -> Self {
        Self::new()
    }
}
