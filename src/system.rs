//! Top-level facade wiring the memory store, rule engine, and processor
//!
//! Construction is explicit: every `MemorySystem` owns its own state and
//! telemetry, and callers that need several instances simply build
//! several. Shared access goes through the `Arc<Mutex<..>>` handles the
//! facade exposes.

use crate::errors::{MemoryError, Result};
use crate::events::{EventContext, SystemEvent};
use crate::memory::{
    Memory, MemoryConfig, MemoryManager, MemoryPatch, MemoryRetrieval, MemoryStats, MemoryStore,
    PersistenceConfig, RetrievalConfig, RetrievalQuery, RetrievalResult, SearchQuery,
};
use crate::rules::{
    ChainResult, ConditionalOutcome, EventOutcome, ProcessorConfig, Rule, RuleChain, RuleEngine,
    RuleProcessor,
};
use crate::telemetry::{TelemetryCollector, TelemetryStats};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Configuration for a whole system instance
#[derive(Debug, Clone, Default)]
pub struct SystemConfig {
    pub memory: MemoryConfig,
    pub retrieval: RetrievalConfig,
    pub processor: ProcessorConfig,
    /// When set, `save_now` and `load_now` use this snapshot path
    pub persistence: Option<PersistenceConfig>,
}

/// One self-contained memory system: records, knowledge graph, rules
pub struct MemorySystem {
    memory: Arc<Mutex<MemoryManager>>,
    engine: Arc<Mutex<RuleEngine>>,
    retrieval: MemoryRetrieval,
    processor: RuleProcessor,
    store: Option<MemoryStore>,
    telemetry: TelemetryCollector,
    auto_cleanup: bool,
    cleanup_interval: std::time::Duration,
}

impl MemorySystem {
    pub fn new(config: SystemConfig) -> Self {
        let telemetry = TelemetryCollector::new();
        let auto_cleanup = config.memory.auto_cleanup;
        let cleanup_interval = config.memory.cleanup_interval;

        let memory = Arc::new(Mutex::new(MemoryManager::new(
            config.memory,
            telemetry.clone(),
        )));
        let engine = Arc::new(Mutex::new(RuleEngine::new(
            Arc::clone(&memory),
            telemetry.clone(),
        )));
        let processor =
            RuleProcessor::with_config(Arc::clone(&engine), telemetry.clone(), config.processor);
        let store = config.persistence.map(MemoryStore::new);

        Self {
            memory,
            engine,
            retrieval: MemoryRetrieval::with_config(config.retrieval),
            processor,
            store,
            telemetry,
            auto_cleanup,
            cleanup_interval,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SystemConfig::default())
    }

    // ---- memory operations ----

    pub fn store_memory(&self, memory: Memory) -> Result<bool> {
        self.memory_guard()?.store_memory(memory)
    }

    pub fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
        Ok(self.memory_guard()?.get_memory(id).cloned())
    }

    pub fn update_memory(&self, id: &str, patch: MemoryPatch) -> Result<()> {
        self.memory_guard()?.update_memory(id, patch)
    }

    /// Idempotent; `Ok(false)` when the id was already absent
    pub fn remove_memory(&self, id: &str) -> Result<bool> {
        Ok(self.memory_guard()?.remove_memory(id))
    }

    pub fn search_memories(&self, query: &SearchQuery) -> Result<Vec<Memory>> {
        Ok(self
            .memory_guard()?
            .search_memories(query)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Scored lexical retrieval over the full store
    pub fn retrieve_memories(&self, query: &RetrievalQuery) -> Result<RetrievalResult> {
        let mut manager = self.memory_guard()?;
        Ok(self.retrieval.retrieve(&mut manager, query))
    }

    pub fn consolidate_memories(
        &self,
        source_ids: &[String],
        summary: Option<String>,
    ) -> Result<Memory> {
        self.memory_guard()?.consolidate_memories(source_ids, summary)
    }

    pub fn cleanup_expired(&self) -> Result<usize> {
        Ok(self.memory_guard()?.cleanup_expired())
    }

    pub fn get_stats(&self) -> Result<MemoryStats> {
        Ok(self.memory_guard()?.get_stats())
    }

    // ---- rule operations ----

    pub fn add_rule(&self, rule: Rule) -> Result<()> {
        self.engine_guard()?.add_rule(rule);
        Ok(())
    }

    pub fn remove_rule(&self, rule_id: &str) -> Result<()> {
        self.engine_guard()?.remove_rule(rule_id);
        Ok(())
    }

    /// Evaluate every active rule against an event
    pub fn process_event(&self, event: &SystemEvent, context: &EventContext) -> Result<EventOutcome> {
        Ok(self.engine_guard()?.process_event(event, context))
    }

    pub fn add_chain(&mut self, chain: RuleChain) {
        self.processor.add_chain(chain);
    }

    pub async fn execute_rule_chain(
        &mut self,
        chain_id: &str,
        event: &SystemEvent,
        context: &EventContext,
    ) -> Result<ChainResult> {
        self.processor.execute_rule_chain(chain_id, event, context).await
    }

    pub fn evaluate_conditional_rule(
        &self,
        conditional_id: &str,
        event: &SystemEvent,
        context: &EventContext,
    ) -> Result<ConditionalOutcome> {
        self.processor.evaluate_conditional_rule(conditional_id, event, context)
    }

    // ---- persistence ----

    /// Write the current memory set to the configured snapshot path
    pub async fn save_now(&self) -> Result<()> {
        let store = self.require_store()?;
        let records = self.memory_guard()?.records();
        // Serialize from a detached copy so the lock never spans the write;
        // the staging manager shares this system's telemetry so snapshot
        // events land in the same collector
        let staging = {
            let mut manager = MemoryManager::new(MemoryConfig::default(), self.telemetry.clone());
            manager.replace_records(records);
            manager
        };
        store.save(&staging).await
    }

    /// Replace in-memory state from the configured snapshot path
    pub async fn load_now(&self) -> Result<usize> {
        let store = self.require_store()?;
        let mut staging = MemoryManager::new(MemoryConfig::default(), self.telemetry.clone());
        let loaded = store.load(&mut staging).await?;
        self.memory_guard()?.replace_records(staging.records());
        Ok(loaded)
    }

    // ---- background tasks ----

    /// Periodic expired-memory sweep; returns `None` when auto-cleanup
    /// is disabled in the memory configuration
    pub fn spawn_auto_cleanup(&self) -> Option<JoinHandle<()>> {
        if !self.auto_cleanup {
            return None;
        }
        let memory = Arc::clone(&self.memory);
        let interval = self.cleanup_interval;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Ok(mut manager) = memory.lock() {
                    manager.cleanup_expired();
                }
            }
        }))
    }

    /// Periodic retraction of expired generated rules
    pub fn spawn_expiry_sweeper(&self) -> JoinHandle<()> {
        self.processor.spawn_expiry_sweeper()
    }

    // ---- handles ----

    pub fn memory(&self) -> Arc<Mutex<MemoryManager>> {
        Arc::clone(&self.memory)
    }

    pub fn engine(&self) -> Arc<Mutex<RuleEngine>> {
        Arc::clone(&self.engine)
    }

    pub fn processor(&mut self) -> &mut RuleProcessor {
        &mut self.processor
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    pub fn telemetry_stats(&self) -> TelemetryStats {
        self.telemetry.get_stats()
    }

    fn memory_guard(&self) -> Result<std::sync::MutexGuard<'_, MemoryManager>> {
        self.memory
            .lock()
            .map_err(|_| MemoryError::Generic("memory lock poisoned".to_string()))
    }

    fn engine_guard(&self) -> Result<std::sync::MutexGuard<'_, RuleEngine>> {
        self.engine
            .lock()
            .map_err(|_| MemoryError::Generic("engine lock poisoned".to_string()))
    }

    fn require_store(&self) -> Result<&MemoryStore> {
        self.store.as_ref().ok_or_else(|| {
            MemoryError::Persistence("no persistence path configured".to_string())
        })
    }
}
