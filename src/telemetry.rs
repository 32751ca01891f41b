//! Telemetry and lifecycle notification for the memory subsystem
//!
//! Components emit `LifecycleEvent`s into a shared collector instead of
//! invoking callbacks; subscribers drain the FIFO buffer at their own pace.
//! Recording never re-enters the emitting component.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Lifecycle event types emitted by the subsystem
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    // Memory manager events
    MemoryStored {
        memory_id: String,
        timestamp: DateTime<Utc>,
    },
    MemoryUpdated {
        memory_id: String,
        timestamp: DateTime<Utc>,
    },
    MemoryRemoved {
        memory_id: String,
        timestamp: DateTime<Utc>,
    },
    MemoryConsolidated {
        memory_id: String,
        source_count: usize,
        timestamp: DateTime<Utc>,
    },
    MemoryExpired {
        memory_id: String,
        timestamp: DateTime<Utc>,
    },

    // Rule engine events
    RuleLog {
        rule_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    RuleMatched {
        rule_id: String,
        event_id: String,
        timestamp: DateTime<Utc>,
    },
    ActionFailed {
        rule_id: String,
        action: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    // Rule processor events
    ChainCompleted {
        chain_id: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    ChainTimedOut {
        chain_id: String,
        timeout_ms: u64,
        timestamp: DateTime<Utc>,
    },
    DynamicRulesGenerated {
        generator_id: String,
        rule_count: usize,
        timestamp: DateTime<Utc>,
    },
    DynamicRuleExpired {
        rule_id: String,
        timestamp: DateTime<Utc>,
    },

    // Persistence events
    SnapshotSaved {
        memory_count: usize,
        timestamp: DateTime<Utc>,
    },
    SnapshotLoaded {
        memory_count: usize,
        timestamp: DateTime<Utc>,
    },

    // Non-fatal anomalies (bad regex, unparseable expression, mixed operators)
    Warning {
        source: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Aggregate counters over recorded events
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub memories_stored: usize,
    pub memories_updated: usize,
    pub memories_removed: usize,
    pub memories_consolidated: usize,
    pub memories_expired: usize,
    pub rule_logs: usize,
    pub rules_matched: usize,
    pub actions_failed: usize,
    pub chains_completed: usize,
    pub chains_timed_out: usize,
    pub dynamic_rules_generated: usize,
    pub dynamic_rules_expired: usize,
    pub snapshots_saved: usize,
    pub snapshots_loaded: usize,
    pub warnings: usize,
}

/// Shared, clonable lifecycle event collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
        }
    }

    /// Record an event (FIFO, in emission order)
    pub fn record(&self, event: LifecycleEvent) {
        {
            let mut stats = self.stats.lock().unwrap();
            match &event {
                LifecycleEvent::MemoryStored { .. } => stats.memories_stored += 1,
                LifecycleEvent::MemoryUpdated { .. } => stats.memories_updated += 1,
                LifecycleEvent::MemoryRemoved { .. } => stats.memories_removed += 1,
                LifecycleEvent::MemoryConsolidated { .. } => stats.memories_consolidated += 1,
                LifecycleEvent::MemoryExpired { .. } => stats.memories_expired += 1,
                LifecycleEvent::RuleLog { .. } => stats.rule_logs += 1,
                LifecycleEvent::RuleMatched { .. } => stats.rules_matched += 1,
                LifecycleEvent::ActionFailed { .. } => stats.actions_failed += 1,
                LifecycleEvent::ChainCompleted { .. } => stats.chains_completed += 1,
                LifecycleEvent::ChainTimedOut { .. } => stats.chains_timed_out += 1,
                LifecycleEvent::DynamicRulesGenerated { rule_count, .. } => {
                    stats.dynamic_rules_generated += rule_count;
                }
                LifecycleEvent::DynamicRuleExpired { .. } => stats.dynamic_rules_expired += 1,
                LifecycleEvent::SnapshotSaved { .. } => stats.snapshots_saved += 1,
                LifecycleEvent::SnapshotLoaded { .. } => stats.snapshots_loaded += 1,
                LifecycleEvent::Warning { .. } => stats.warnings += 1,
            }
        }

        let mut events = self.events.lock().unwrap();
        events.push(event);
    }

    /// Convenience for warning events
    pub fn warn(&self, source: &str, message: impl Into<String>) {
        self.record(LifecycleEvent::Warning {
            source: source.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Get a copy of current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        self.stats.lock().unwrap().clone()
    }

    /// Drain all buffered events, oldest first
    pub fn drain_events(&self) -> Vec<LifecycleEvent> {
        let mut events = self.events.lock().unwrap();
        std::mem::take(&mut *events)
    }

    /// Number of buffered, undrained events
    pub fn pending_events(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Clear events and reset statistics
    pub fn reset(&self) {
        self.events.lock().unwrap().clear();
        *self.stats.lock().unwrap() = TelemetryStats::default();
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
