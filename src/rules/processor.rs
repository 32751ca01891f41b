//! Rule processor: chains, conditional rules, dynamic generation
//!
//! Higher-order orchestration over the rule engine. The engine lock is
//! never held across an await: each chain step locks, evaluates, and
//! releases before any backoff sleep or fan-out suspension.

use crate::errors::{MemoryError, Result};
use crate::events::{EventContext, SystemEvent};
use crate::rules::chain::{backoff_delay_ms, ChainResult, ChainState, ChainStepResult, RuleChain};
use crate::rules::conditional::{ConditionalOutcome, ConditionalRule, SubCondition};
use crate::rules::dynamic::{DynamicRuleGenerator, GeneratorConfig};
use crate::rules::engine::{RuleEngine, RuleSideEffects};
use crate::rules::expression::Expr;
use crate::telemetry::{LifecycleEvent, TelemetryCollector};
use chrono::{Duration as ChronoDuration, Utc};
use futures_util::future::join_all;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Custom sub-condition evaluator signature
pub type EvaluatorFn =
    dyn Fn(&SystemEvent, &EventContext) -> Result<bool> + Send + Sync;

/// Processor-level configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Base for the per-rule retry backoff (`base * 2^attempt`);
    /// 1000ms gives the documented 2^attempt-seconds schedule
    pub base_backoff_ms: u64,
    /// Cadence of the generated-rule expiry sweep
    pub sweep_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: 1000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Orchestrates rule chains, conditional rules, and dynamic generators
pub struct RuleProcessor {
    engine: Arc<Mutex<RuleEngine>>,
    chains: HashMap<String, RuleChain>,
    chain_states: HashMap<String, ChainState>,
    conditionals: HashMap<String, ConditionalRule>,
    evaluators: HashMap<String, Box<EvaluatorFn>>,
    generators: HashMap<String, DynamicRuleGenerator>,
    /// Generated rule id -> generator id, shared with the sweeper task
    generated: Arc<Mutex<HashMap<String, String>>>,
    config: ProcessorConfig,
    telemetry: TelemetryCollector,
}

impl RuleProcessor {
    pub fn new(engine: Arc<Mutex<RuleEngine>>, telemetry: TelemetryCollector) -> Self {
        Self::with_config(engine, telemetry, ProcessorConfig::default())
    }

    pub fn with_config(
        engine: Arc<Mutex<RuleEngine>>,
        telemetry: TelemetryCollector,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            engine,
            chains: HashMap::new(),
            chain_states: HashMap::new(),
            conditionals: HashMap::new(),
            evaluators: HashMap::new(),
            generators: HashMap::new(),
            generated: Arc::new(Mutex::new(HashMap::new())),
            config,
            telemetry,
        }
    }

    pub fn engine(&self) -> Arc<Mutex<RuleEngine>> {
        Arc::clone(&self.engine)
    }

    // ---- rule chains ----

    pub fn add_chain(&mut self, chain: RuleChain) {
        self.chain_states.insert(chain.id.clone(), ChainState::Idle);
        self.chains.insert(chain.id.clone(), chain);
    }

    pub fn get_chain(&self, id: &str) -> Option<&RuleChain> {
        self.chains.get(id)
    }

    pub fn get_chain_state(&self, id: &str) -> Option<ChainState> {
        self.chain_states.get(id).copied()
    }

    /// Run a chain against an event. The configured timeout is hard: on
    /// expiry, in-flight evaluations are abandoned and the result carries
    /// a timeout error.
    pub async fn execute_rule_chain(
        &mut self,
        chain_id: &str,
        event: &SystemEvent,
        context: &EventContext,
    ) -> Result<ChainResult> {
        let chain = self
            .chains
            .get(chain_id)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound {
                id: chain_id.to_string(),
            })?;

        self.chain_states
            .insert(chain.id.clone(), ChainState::Running);
        let started = Instant::now();
        let budget = Duration::from_millis(chain.timeout_ms);

        let run = async {
            if chain.parallel {
                run_parallel(&self.engine, &chain, event, context, self.config.base_backoff_ms)
                    .await
            } else {
                run_sequential(&self.engine, &chain, event, context, self.config.base_backoff_ms)
                    .await
            }
        };

        let result = match timeout(budget, run).await {
            Ok((steps, success)) => {
                let state = if success {
                    ChainState::Completed
                } else {
                    ChainState::Failed
                };
                let error = if success {
                    None
                } else {
                    steps
                        .iter()
                        .find(|s| !s.success)
                        .and_then(|s| s.error.clone())
                        .or_else(|| Some("chain step failed".to_string()))
                };
                ChainResult {
                    chain_id: chain.id.clone(),
                    state,
                    success,
                    steps,
                    timed_out: false,
                    error,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
            Err(_) => {
                self.telemetry.record(LifecycleEvent::ChainTimedOut {
                    chain_id: chain.id.clone(),
                    timeout_ms: chain.timeout_ms,
                    timestamp: Utc::now(),
                });
                ChainResult {
                    chain_id: chain.id.clone(),
                    state: ChainState::Failed,
                    success: false,
                    steps: Vec::new(),
                    timed_out: true,
                    error: Some(
                        MemoryError::Timeout {
                            duration_ms: chain.timeout_ms,
                        }
                        .to_string(),
                    ),
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
        };

        self.chain_states.insert(chain.id.clone(), result.state);
        self.telemetry.record(LifecycleEvent::ChainCompleted {
            chain_id: chain.id.clone(),
            success: result.success,
            duration_ms: result.duration_ms,
            timestamp: Utc::now(),
        });
        Ok(result)
    }

    // ---- conditional rules ----

    pub fn add_conditional_rule(&mut self, rule: ConditionalRule) {
        self.conditionals.insert(rule.id.clone(), rule);
    }

    pub fn get_conditional_rule(&self, id: &str) -> Option<&ConditionalRule> {
        self.conditionals.get(id)
    }

    /// Register a named custom evaluator for `SubCondition::Custom`
    pub fn register_evaluator(
        &mut self,
        name: impl Into<String>,
        evaluator: impl Fn(&SystemEvent, &EventContext) -> Result<bool> + Send + Sync + 'static,
    ) {
        self.evaluators.insert(name.into(), Box::new(evaluator));
    }

    /// Evaluate every sub-condition, combine per the rule's mode, and on a
    /// positive combination execute the bound actions. Sub-condition
    /// failures (bad expression, unknown rule or evaluator, evaluator
    /// error) are caught as non-matches and logged, never propagated.
    pub fn evaluate_conditional_rule(
        &self,
        conditional_id: &str,
        event: &SystemEvent,
        context: &EventContext,
    ) -> Result<ConditionalOutcome> {
        let conditional =
            self.conditionals
                .get(conditional_id)
                .ok_or_else(|| MemoryError::NotFound {
                    id: conditional_id.to_string(),
                })?;

        let mut matched_conditions = Vec::new();
        for (index, condition) in conditional.conditions.iter().enumerate() {
            if self.sub_condition_matches(condition, event, context) {
                matched_conditions.push(index);
            }
        }

        let combination_matched = conditional
            .evaluation_mode
            .combine(matched_conditions.len(), conditional.conditions.len());

        let mut outcome = ConditionalOutcome {
            conditional_id: conditional.id.clone(),
            success: combination_matched,
            combination_matched,
            matched_conditions,
            actions: Vec::new(),
            notifications: Vec::new(),
            stored_memory_ids: Vec::new(),
            modified_data: json!({}),
            blocked: false,
            error: None,
        };

        if combination_matched && !conditional.actions.is_empty() {
            let engine = self
                .engine
                .lock()
                .map_err(|_| MemoryError::Generic("engine lock poisoned".to_string()))?;
            let mut effects = RuleSideEffects {
                modified_data: &mut outcome.modified_data,
                notifications: &mut outcome.notifications,
                stored_memory_ids: &mut outcome.stored_memory_ids,
            };
            let execution = engine.execute_actions(
                &conditional.id,
                &conditional.name,
                &conditional.actions,
                event,
                &mut outcome.blocked,
                &mut effects,
            );
            outcome.success = execution.success;
            outcome.error = execution.error.clone();
            outcome.actions = execution.actions;
        }

        Ok(outcome)
    }

    fn sub_condition_matches(
        &self,
        condition: &SubCondition,
        event: &SystemEvent,
        context: &EventContext,
    ) -> bool {
        match condition {
            SubCondition::RuleRef { rule_id } => {
                let engine = match self.engine.lock() {
                    Ok(engine) => engine,
                    Err(_) => return false,
                };
                match engine.rule_matches(rule_id, event, context) {
                    Ok(matched) => matched,
                    Err(e) => {
                        self.telemetry
                            .warn("conditional", format!("rule ref {rule_id}: {e}"));
                        false
                    }
                }
            }
            SubCondition::Expression { expression } => match Expr::parse(expression) {
                Ok(expr) => expr.eval(event, context),
                Err(e) => {
                    self.telemetry
                        .warn("conditional", format!("expression {expression:?}: {e}"));
                    false
                }
            },
            SubCondition::Custom { evaluator } => match self.evaluators.get(evaluator) {
                Some(function) => match function(event, context) {
                    Ok(matched) => matched,
                    Err(e) => {
                        self.telemetry
                            .warn("conditional", format!("evaluator {evaluator}: {e}"));
                        false
                    }
                },
                None => {
                    self.telemetry
                        .warn("conditional", format!("unknown evaluator {evaluator}"));
                    false
                }
            },
        }
    }

    // ---- dynamic rule generation ----

    pub fn register_generator(&mut self, generator: DynamicRuleGenerator) {
        self.generators.insert(generator.id.clone(), generator);
    }

    pub fn generator_config(&self, id: &str) -> Option<&GeneratorConfig> {
        self.generators.get(id).map(|g| &g.config)
    }

    /// Invoke a generator, admit up to `max_rules` of its output with a
    /// TTL stamp, and register the admitted rules with the engine.
    pub fn generate_dynamic_rules(
        &mut self,
        generator_id: &str,
        event: &SystemEvent,
        context: &EventContext,
    ) -> Result<Vec<String>> {
        let generator =
            self.generators
                .get(generator_id)
                .ok_or_else(|| MemoryError::NotFound {
                    id: generator_id.to_string(),
                })?;

        let mut rules = (generator.generate)(event, context);
        rules.truncate(generator.config.max_rules);

        let now = Utc::now();
        let expires_at = now + ChronoDuration::milliseconds(generator.config.ttl_ms as i64);

        let mut admitted = Vec::new();
        {
            let mut engine = self
                .engine
                .lock()
                .map_err(|_| MemoryError::Generic("engine lock poisoned".to_string()))?;
            let mut generated = self.generated.lock().unwrap();
            for mut rule in rules {
                rule.generated_at = Some(now);
                rule.expires_at = Some(expires_at);
                generated.insert(rule.id.clone(), generator_id.to_string());
                admitted.push(rule.id.clone());
                engine.add_rule(rule);
            }
        }

        self.telemetry.record(LifecycleEvent::DynamicRulesGenerated {
            generator_id: generator_id.to_string(),
            rule_count: admitted.len(),
            timestamp: now,
        });
        Ok(admitted)
    }

    /// Retract expired generated rules from both the processor's
    /// bookkeeping and the engine's active set. Returns the retract count.
    pub fn sweep_expired_rules(&self) -> usize {
        sweep_generated(&self.engine, &self.generated, &self.telemetry)
    }

    /// Spawn an interval-driven sweep task (default cadence: one minute).
    /// The handle can be aborted when the processor is shut down.
    pub fn spawn_expiry_sweeper(&self) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let generated = Arc::clone(&self.generated);
        let telemetry = self.telemetry.clone();
        let interval = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweep_generated(&engine, &generated, &telemetry);
            }
        })
    }

    /// Count of live generated rules being tracked
    pub fn generated_rule_count(&self) -> usize {
        self.generated.lock().unwrap().len()
    }
}

fn sweep_generated(
    engine: &Arc<Mutex<RuleEngine>>,
    generated: &Arc<Mutex<HashMap<String, String>>>,
    telemetry: &TelemetryCollector,
) -> usize {
    let now = Utc::now();
    let Ok(mut engine) = engine.lock() else {
        return 0;
    };
    let mut generated = generated.lock().unwrap();

    let expired: Vec<String> = generated
        .keys()
        .filter(|rule_id| match engine.get_rule(rule_id) {
            Some(rule) => rule.is_expired(now),
            // Already gone from the engine; drop the bookkeeping too
            None => true,
        })
        .cloned()
        .collect();

    for rule_id in &expired {
        engine.remove_rule(rule_id);
        generated.remove(rule_id);
        telemetry.record(LifecycleEvent::DynamicRuleExpired {
            rule_id: rule_id.clone(),
            timestamp: now,
        });
    }
    expired.len()
}

/// Run chain steps in declared order, honoring `stop_on_failure`
async fn run_sequential(
    engine: &Arc<Mutex<RuleEngine>>,
    chain: &RuleChain,
    event: &SystemEvent,
    context: &EventContext,
    base_backoff_ms: u64,
) -> (Vec<ChainStepResult>, bool) {
    let mut steps = Vec::new();
    let mut success = true;

    for rule_id in &chain.rule_ids {
        let step =
            execute_step_with_retry(engine, rule_id, event, context, chain.retry_count, base_backoff_ms)
                .await;
        let failed = !step.success;
        steps.push(step);
        if failed {
            success = false;
            if chain.stop_on_failure {
                break;
            }
        }
    }

    (steps, success)
}

/// Fan out all chain steps at once; cross-rule ordering is forfeited
async fn run_parallel(
    engine: &Arc<Mutex<RuleEngine>>,
    chain: &RuleChain,
    event: &SystemEvent,
    context: &EventContext,
    base_backoff_ms: u64,
) -> (Vec<ChainStepResult>, bool) {
    let futures = chain.rule_ids.iter().map(|rule_id| {
        execute_step_with_retry(engine, rule_id, event, context, chain.retry_count, base_backoff_ms)
    });

    let steps = join_all(futures).await;
    let success = steps.iter().all(|s| s.success);
    (steps, success)
}

/// Evaluate one rule with retry. Each attempt locks the engine only for
/// the synchronous evaluation; backoff sleeps run unlocked.
async fn execute_step_with_retry(
    engine: &Arc<Mutex<RuleEngine>>,
    rule_id: &str,
    event: &SystemEvent,
    context: &EventContext,
    retry_count: u32,
    base_backoff_ms: u64,
) -> ChainStepResult {
    let attempts_allowed = retry_count.max(1);
    let mut last_error = None;
    let mut last_execution = None;

    for attempt in 0..attempts_allowed {
        let evaluation = {
            let Ok(engine) = engine.lock() else {
                return ChainStepResult {
                    rule_id: rule_id.to_string(),
                    matched: false,
                    success: false,
                    attempts: attempt + 1,
                    execution: None,
                    error: Some("engine lock poisoned".to_string()),
                };
            };
            engine.evaluate_rule(rule_id, event, context)
        };

        match evaluation {
            // Conditions did not hold: a successful no-op step
            Ok(None) => {
                return ChainStepResult {
                    rule_id: rule_id.to_string(),
                    matched: false,
                    success: true,
                    attempts: attempt + 1,
                    execution: None,
                    error: None,
                }
            }
            Ok(Some(execution)) if execution.success => {
                return ChainStepResult {
                    rule_id: rule_id.to_string(),
                    matched: true,
                    success: true,
                    attempts: attempt + 1,
                    execution: Some(execution),
                    error: None,
                }
            }
            Ok(Some(execution)) => {
                last_error = execution.error.clone();
                last_execution = Some(execution);
            }
            // Missing rule is permanent; retrying cannot help
            Err(e @ MemoryError::NotFound { .. }) => {
                return ChainStepResult {
                    rule_id: rule_id.to_string(),
                    matched: false,
                    success: false,
                    attempts: attempt + 1,
                    execution: None,
                    error: Some(e.to_string()),
                }
            }
            Err(e) => {
                last_error = Some(e.to_string());
            }
        }

        if attempt + 1 < attempts_allowed {
            sleep(Duration::from_millis(backoff_delay_ms(base_backoff_ms, attempt))).await;
        }
    }

    ChainStepResult {
        rule_id: rule_id.to_string(),
        matched: last_execution.is_some(),
        success: false,
        attempts: attempts_allowed,
        execution: last_execution,
        error: last_error.or_else(|| Some("rule execution failed".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Severity;
    use crate::memory::MemoryManager;
    use crate::rules::types::{
        ActionType, Rule, RuleAction, RuleCategory,
    };
    use serde_json::json;

    fn processor_with(config: ProcessorConfig) -> RuleProcessor {
        let memory = Arc::new(Mutex::new(MemoryManager::with_defaults()));
        let telemetry = TelemetryCollector::new();
        let engine = Arc::new(Mutex::new(RuleEngine::new(memory, telemetry.clone())));
        RuleProcessor::with_config(engine, telemetry, config)
    }

    fn fast_processor() -> RuleProcessor {
        processor_with(ProcessorConfig {
            base_backoff_ms: 10,
            sweep_interval: Duration::from_millis(50),
        })
    }

    fn event() -> SystemEvent {
        SystemEvent::new("deploy", "ci")
            .with_data(json!({"env": "staging"}))
            .with_severity(Severity::Info)
    }

    fn passing_rule(id: &str) -> Rule {
        Rule::new(id, format!("rule {id}"), RuleCategory::Technical)
            .with_action(RuleAction::new(ActionType::Log, json!({"message": "ok"})))
    }

    fn failing_rule(id: &str) -> Rule {
        // notify without a message always fails
        Rule::new(id, format!("rule {id}"), RuleCategory::Technical)
            .with_action(RuleAction::new(ActionType::Notify, json!({})))
    }

    fn add_rule(processor: &RuleProcessor, rule: Rule) {
        processor.engine().lock().unwrap().add_rule(rule);
    }

    #[tokio::test]
    async fn test_sequential_chain_completes() {
        let mut processor = fast_processor();
        add_rule(&processor, passing_rule("r1"));
        add_rule(&processor, passing_rule("r2"));
        processor.add_chain(RuleChain::new(
            "c1",
            "two step",
            vec!["r1".to_string(), "r2".to_string()],
        ));

        let result = processor
            .execute_rule_chain("c1", &event(), &EventContext::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.state, ChainState::Completed);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(processor.get_chain_state("c1"), Some(ChainState::Completed));
    }

    #[tokio::test]
    async fn test_stop_on_failure_aborts_remaining_steps() {
        let mut processor = fast_processor();
        add_rule(&processor, failing_rule("bad"));
        add_rule(&processor, passing_rule("good"));
        processor.add_chain(RuleChain::new(
            "c1",
            "abort early",
            vec!["bad".to_string(), "good".to_string()],
        ));

        let result = processor
            .execute_rule_chain("c1", &event(), &EventContext::new())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.state, ChainState::Failed);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_continue_on_failure_runs_all_steps() {
        let mut processor = fast_processor();
        add_rule(&processor, failing_rule("bad"));
        add_rule(&processor, passing_rule("good"));
        processor.add_chain(
            RuleChain::new("c1", "keep going", vec!["bad".to_string(), "good".to_string()])
                .continue_on_failure(),
        );

        let result = processor
            .execute_rule_chain("c1", &event(), &EventContext::new())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.steps.len(), 2);
        assert!(result.steps[1].success);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_counts_attempts() {
        let mut processor = fast_processor();
        add_rule(&processor, failing_rule("flaky"));
        processor.add_chain(
            RuleChain::new("c1", "retry", vec!["flaky".to_string()]).with_retry_count(3),
        );

        let result = processor
            .execute_rule_chain("c1", &event(), &EventContext::new())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.steps[0].attempts, 3);
        assert!(result.steps[0].error.is_some());
    }

    #[tokio::test]
    async fn test_parallel_chain_runs_all() {
        let mut processor = fast_processor();
        for id in ["p1", "p2", "p3"] {
            add_rule(&processor, passing_rule(id));
        }
        processor.add_chain(
            RuleChain::new(
                "c1",
                "fan out",
                vec!["p1".to_string(), "p2".to_string(), "p3".to_string()],
            )
            .parallel(),
        );

        let result = processor
            .execute_rule_chain("c1", &event(), &EventContext::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.steps.len(), 3);
    }

    #[tokio::test]
    async fn test_chain_timeout_is_hard() {
        let mut processor = processor_with(ProcessorConfig {
            base_backoff_ms: 500,
            sweep_interval: Duration::from_secs(60),
        });
        add_rule(&processor, failing_rule("slow"));
        // Retries force a 500ms backoff sleep; the 50ms budget expires first
        processor.add_chain(
            RuleChain::new("c1", "deadline", vec!["slow".to_string()])
                .with_retry_count(5)
                .with_timeout_ms(50),
        );

        let started = Instant::now();
        let result = processor
            .execute_rule_chain("c1", &event(), &EventContext::new())
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(!result.success);
        assert!(result.timed_out);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(result.state, ChainState::Failed);
        // Bounded margin around the configured budget
        assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_unknown_chain_is_not_found() {
        let mut processor = fast_processor();
        let err = processor
            .execute_rule_chain("ghost", &event(), &EventContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_rule_fails_step_without_retry() {
        let mut processor = fast_processor();
        processor.add_chain(
            RuleChain::new("c1", "missing", vec!["ghost".to_string()]).with_retry_count(4),
        );

        let result = processor
            .execute_rule_chain("c1", &event(), &EventContext::new())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.steps[0].attempts, 1);
    }

    #[test]
    fn test_conditional_majority_two_of_three() {
        let mut processor = fast_processor();
        add_rule(&processor, passing_rule("always"));

        let conditional = ConditionalRule::new(
            "cond1",
            "majority vote",
            crate::rules::conditional::EvaluationMode::Majority,
        )
        .with_condition(SubCondition::RuleRef {
            rule_id: "always".to_string(),
        })
        .with_condition(SubCondition::Expression {
            expression: "data.env == 'staging'".to_string(),
        })
        .with_condition(SubCondition::Expression {
            expression: "data.env == 'production'".to_string(),
        })
        .with_action(RuleAction::new(
            ActionType::Notify,
            json!({"message": "majority held"}),
        ));
        processor.add_conditional_rule(conditional);

        let outcome = processor
            .evaluate_conditional_rule("cond1", &event(), &EventContext::new())
            .unwrap();

        assert!(outcome.success);
        assert!(outcome.combination_matched);
        assert_eq!(outcome.matched_conditions, vec![0, 1]);
        assert_eq!(outcome.notifications.len(), 1);
    }

    #[test]
    fn test_conditional_failures_are_non_matches() {
        let mut processor = fast_processor();
        processor.register_evaluator("exploder", |_event, _ctx| {
            Err(MemoryError::Generic("boom".to_string()))
        });

        let conditional = ConditionalRule::new(
            "cond1",
            "all must hold",
            crate::rules::conditional::EvaluationMode::All,
        )
        .with_condition(SubCondition::Expression {
            expression: "((broken".to_string(),
        })
        .with_condition(SubCondition::Custom {
            evaluator: "exploder".to_string(),
        })
        .with_condition(SubCondition::RuleRef {
            rule_id: "no_such_rule".to_string(),
        });
        processor.add_conditional_rule(conditional);

        let outcome = processor
            .evaluate_conditional_rule("cond1", &event(), &EventContext::new())
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.matched_conditions.is_empty());
        // Each failure logged a warning instead of propagating
        assert_eq!(processor.telemetry.get_stats().warnings, 3);
    }

    #[test]
    fn test_generate_dynamic_rules_caps_and_stamps() {
        let mut processor = fast_processor();
        processor.register_generator(DynamicRuleGenerator::new(
            "gen1",
            GeneratorConfig {
                max_rules: 2,
                ttl_ms: 60_000,
            },
            |_event, _ctx| {
                (0..5)
                    .map(|i| {
                        Rule::new(format!("dyn_{i}"), "generated", RuleCategory::Technical)
                    })
                    .collect()
            },
        ));

        let admitted = processor
            .generate_dynamic_rules("gen1", &event(), &EventContext::new())
            .unwrap();

        assert_eq!(admitted.len(), 2);
        assert_eq!(processor.generated_rule_count(), 2);

        let engine = processor.engine();
        let engine = engine.lock().unwrap();
        let rule = engine.get_rule("dyn_0").unwrap();
        assert!(rule.generated_at.is_some());
        assert!(rule.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_sweep_retracts_expired_generated_rules() {
        let mut processor = fast_processor();
        processor.register_generator(DynamicRuleGenerator::new(
            "gen1",
            GeneratorConfig {
                max_rules: 10,
                ttl_ms: 30,
            },
            |_event, _ctx| vec![Rule::new("ephemeral", "ttl rule", RuleCategory::Technical)],
        ));
        processor
            .generate_dynamic_rules("gen1", &event(), &EventContext::new())
            .unwrap();

        // Not yet expired
        assert_eq!(processor.sweep_expired_rules(), 0);

        sleep(Duration::from_millis(60)).await;
        assert_eq!(processor.sweep_expired_rules(), 1);
        assert_eq!(processor.generated_rule_count(), 0);
        assert!(processor.engine().lock().unwrap().get_rule("ephemeral").is_none());
    }

    #[tokio::test]
    async fn test_background_sweeper_task() {
        let mut processor = fast_processor();
        processor.register_generator(DynamicRuleGenerator::new(
            "gen1",
            GeneratorConfig {
                max_rules: 10,
                ttl_ms: 20,
            },
            |_event, _ctx| vec![Rule::new("short_lived", "ttl rule", RuleCategory::Technical)],
        ));
        processor
            .generate_dynamic_rules("gen1", &event(), &EventContext::new())
            .unwrap();

        let sweeper = processor.spawn_expiry_sweeper();
        // Wait past the ttl plus one sweep interval
        sleep(Duration::from_millis(150)).await;
        sweeper.abort();

        assert!(processor
            .engine()
            .lock()
            .unwrap()
            .get_rule("short_lived")
            .is_none());
    }
}
