//! Rule engine: evaluates active rules against incoming events
//!
//! Rules run in descending priority order with registration-order ties;
//! within a rule, conditions and actions execute in declared order. A
//! failing action aborts that rule's remaining actions but never other
//! rules (fault isolation per rule).

use crate::errors::{MemoryError, Result};
use crate::events::{EventContext, SystemEvent};
use crate::memory::{Memory, MemoryContext, MemoryManager, MemoryType};
use crate::rules::condition::evaluate_conditions;
use crate::rules::types::{
    ActionOutcome, ActionType, EventOutcome, Notification, Rule, RuleAction, RuleExecutionResult,
};
use crate::telemetry::{LifecycleEvent, TelemetryCollector};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// The active rule set plus the shared memory handle actions write into
pub struct RuleEngine {
    rules: HashMap<String, Rule>,
    /// Registration sequence per rule id, for stable priority ties
    registration: HashMap<String, u64>,
    next_seq: u64,
    memory: Arc<Mutex<MemoryManager>>,
    telemetry: TelemetryCollector,
}

impl RuleEngine {
    pub fn new(memory: Arc<Mutex<MemoryManager>>, telemetry: TelemetryCollector) -> Self {
        Self {
            rules: HashMap::new(),
            registration: HashMap::new(),
            next_seq: 0,
            memory,
            telemetry,
        }
    }

    /// Register a rule. Re-adding an id replaces the rule but keeps its
    /// original registration order.
    pub fn add_rule(&mut self, rule: Rule) {
        if rule.uses_mixed_operators() {
            self.telemetry.warn(
                "engine",
                format!(
                    "rule {} mixes logical operators; conditions evaluate as a strict left fold",
                    rule.id
                ),
            );
        }
        self.registration.entry(rule.id.clone()).or_insert_with(|| {
            let seq = self.next_seq;
            self.next_seq += 1;
            seq
        });
        self.rules.insert(rule.id.clone(), rule);
    }

    /// Remove a rule; removing a missing id is a no-op
    pub fn remove_rule(&mut self, id: &str) {
        self.rules.remove(id);
        self.registration.remove(id);
    }

    pub fn get_rule(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Active, non-expired rules in evaluation order: priority descending,
    /// ties by registration order.
    pub fn active_rules(&self) -> Vec<&Rule> {
        let now = Utc::now();
        let mut rules: Vec<&Rule> = self
            .rules
            .values()
            .filter(|r| r.is_active && !r.is_expired(now))
            .collect();
        rules.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| {
                let seq_a = self.registration.get(&a.id).copied().unwrap_or(u64::MAX);
                let seq_b = self.registration.get(&b.id).copied().unwrap_or(u64::MAX);
                seq_a.cmp(&seq_b)
            })
        });
        rules
    }

    /// Evaluate every active rule against an event, executing matched
    /// rules' actions. Deterministic for a fixed rule set and event.
    pub fn process_event(&self, event: &SystemEvent, context: &EventContext) -> EventOutcome {
        let mut outcome = EventOutcome {
            modified_data: json!({}),
            ..Default::default()
        };

        for rule in self.active_rules() {
            if !evaluate_conditions(&rule.conditions, event, context, &self.telemetry) {
                continue;
            }

            self.telemetry.record(LifecycleEvent::RuleMatched {
                rule_id: rule.id.clone(),
                event_id: event.id.clone(),
                timestamp: Utc::now(),
            });

            let result = {
                let mut effects = RuleSideEffects {
                    modified_data: &mut outcome.modified_data,
                    notifications: &mut outcome.notifications,
                    stored_memory_ids: &mut outcome.stored_memory_ids,
                };
                self.execute_rule(rule, event, &mut outcome.blocked, &mut effects)
            };
            outcome.results.push(result);
        }

        outcome
    }

    /// Evaluate a single rule by id (used by chains and conditional
    /// sub-conditions). `Ok(None)` when conditions do not hold.
    pub fn evaluate_rule(
        &self,
        rule_id: &str,
        event: &SystemEvent,
        context: &EventContext,
    ) -> Result<Option<RuleExecutionResult>> {
        let rule = self.rules.get(rule_id).ok_or_else(|| MemoryError::NotFound {
            id: rule_id.to_string(),
        })?;

        if !evaluate_conditions(&rule.conditions, event, context, &self.telemetry) {
            return Ok(None);
        }

        let mut blocked = false;
        let mut modified = json!({});
        let mut notifications = Vec::new();
        let mut stored = Vec::new();
        let result = self.execute_rule(
            rule,
            event,
            &mut blocked,
            &mut RuleSideEffects {
                modified_data: &mut modified,
                notifications: &mut notifications,
                stored_memory_ids: &mut stored,
            },
        );
        Ok(Some(result))
    }

    /// Whether a rule's conditions hold, without running actions
    pub fn rule_matches(
        &self,
        rule_id: &str,
        event: &SystemEvent,
        context: &EventContext,
    ) -> Result<bool> {
        let rule = self.rules.get(rule_id).ok_or_else(|| MemoryError::NotFound {
            id: rule_id.to_string(),
        })?;
        Ok(evaluate_conditions(&rule.conditions, event, context, &self.telemetry))
    }

    /// Execute one action list: declared order, abort on first failure
    pub(crate) fn execute_actions(
        &self,
        rule_id: &str,
        rule_name: &str,
        actions: &[RuleAction],
        event: &SystemEvent,
        blocked: &mut bool,
        effects: &mut RuleSideEffects<'_>,
    ) -> RuleExecutionResult {
        let started = Instant::now();
        let mut outcomes = Vec::new();
        let mut error = None;

        for action in actions {
            match self.run_action(rule_id, action, event, blocked, effects) {
                Ok(()) => outcomes.push(ActionOutcome {
                    action_type: action.action_type,
                    success: true,
                    error: None,
                }),
                Err(e) => {
                    let message = e.to_string();
                    self.telemetry.record(LifecycleEvent::ActionFailed {
                        rule_id: rule_id.to_string(),
                        action: format!("{:?}", action.action_type),
                        error: message.clone(),
                        timestamp: Utc::now(),
                    });
                    outcomes.push(ActionOutcome {
                        action_type: action.action_type,
                        success: false,
                        error: Some(message.clone()),
                    });
                    error = Some(message);
                    // Remaining actions of this rule are skipped
                    break;
                }
            }
        }

        RuleExecutionResult {
            rule_id: rule_id.to_string(),
            rule_name: rule_name.to_string(),
            success: error.is_none(),
            actions: outcomes,
            error,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn execute_rule(
        &self,
        rule: &Rule,
        event: &SystemEvent,
        blocked: &mut bool,
        effects: &mut RuleSideEffects<'_>,
    ) -> RuleExecutionResult {
        self.execute_actions(&rule.id, &rule.name, &rule.actions, event, blocked, effects)
    }

    fn run_action(
        &self,
        rule_id: &str,
        action: &RuleAction,
        event: &SystemEvent,
        blocked: &mut bool,
        effects: &mut RuleSideEffects<'_>,
    ) -> Result<()> {
        match action.action_type {
            ActionType::Log => {
                let message = action
                    .parameters
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(&event.event_type)
                    .to_string();
                self.telemetry.record(LifecycleEvent::RuleLog {
                    rule_id: rule_id.to_string(),
                    message,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            ActionType::Notify => {
                let message = action
                    .parameters
                    .get("message")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        MemoryError::Validation("notify action requires a message".to_string())
                    })?
                    .to_string();
                let channel = action
                    .parameters
                    .get("channel")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                effects.notifications.push(Notification {
                    rule_id: rule_id.to_string(),
                    message,
                    channel,
                });
                Ok(())
            }
            ActionType::Modify => {
                let set = action.parameters.get("set").and_then(Value::as_object).ok_or_else(
                    || MemoryError::Validation("modify action requires a 'set' object".to_string()),
                )?;
                let target = effects.modified_data.as_object_mut().ok_or_else(|| {
                    MemoryError::Validation("modified data is not an object".to_string())
                })?;
                for (key, value) in set {
                    target.insert(key.clone(), value.clone());
                }
                Ok(())
            }
            ActionType::Block => {
                *blocked = true;
                Ok(())
            }
            ActionType::Enhance => {
                let target = effects.modified_data.as_object_mut().ok_or_else(|| {
                    MemoryError::Validation("modified data is not an object".to_string())
                })?;
                let enhancements = target
                    .entry("enhancements".to_string())
                    .or_insert_with(|| json!([]));
                // A prior modify may have set this key to anything
                enhancements
                    .as_array_mut()
                    .ok_or_else(|| {
                        MemoryError::Validation(
                            "enhancements field is not an array".to_string(),
                        )
                    })?
                    .push(action.parameters.clone());
                Ok(())
            }
            ActionType::StoreMemory => {
                let memory = self.synthesize_memory(action, event)?;
                let memory_id = memory.id.clone();
                let mut manager = self
                    .memory
                    .lock()
                    .map_err(|_| MemoryError::Generic("memory lock poisoned".to_string()))?;
                manager.store_memory(memory)?;
                effects.stored_memory_ids.push(memory_id);
                Ok(())
            }
        }
    }

    /// Build a memory from a `store_memory` action's parameters and the
    /// triggering event
    fn synthesize_memory(&self, action: &RuleAction, event: &SystemEvent) -> Result<Memory> {
        let params = &action.parameters;
        let content = params
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} event from {}", event.event_type, event.source));

        let memory_type = match params.get("memory_type") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| MemoryError::Validation(format!("invalid memory_type: {e}")))?,
            None => MemoryType::Episodic,
        };

        let mut memory = Memory::new(content, memory_type);
        if let Some(importance) = params.get("importance").and_then(Value::as_f64) {
            memory.importance = importance;
        }
        if let Some(tags) = params.get("tags").and_then(Value::as_array) {
            memory.tags = tags
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        memory.context = MemoryContext {
            extra: [
                ("event_id".to_string(), json!(event.id)),
                ("event_type".to_string(), json!(event.event_type)),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        Ok(memory)
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    pub fn memory_handle(&self) -> Arc<Mutex<MemoryManager>> {
        Arc::clone(&self.memory)
    }
}

/// Mutable accumulators shared by a rule's actions during one pass
pub(crate) struct RuleSideEffects<'a> {
    pub modified_data: &'a mut Value,
    pub notifications: &'a mut Vec<Notification>,
    pub stored_memory_ids: &'a mut Vec<String>,
}
