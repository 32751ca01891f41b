//! Event-driven rule system
//!
//! Declarative rules evaluated against system events, plus the
//! higher-order constructs built on them: chains with retry and
//! timeout, conditional rules combining sub-conditions, and dynamic
//! generators that emit short-lived rules.

pub mod chain;
pub mod condition;
pub mod conditional;
pub mod dynamic;
pub mod engine;
pub mod expression;
pub mod processor;
pub mod types;

pub use chain::{backoff_delay_ms, ChainResult, ChainState, ChainStepResult, RuleChain};
pub use condition::{evaluate_condition, evaluate_conditions};
pub use conditional::{ConditionalOutcome, ConditionalRule, EvaluationMode, SubCondition};
pub use dynamic::{DynamicRuleGenerator, GeneratorConfig, GeneratorFn};
pub use engine::RuleEngine;
pub use expression::{CmpOp, Expr};
pub use processor::{EvaluatorFn, ProcessorConfig, RuleProcessor};
pub use types::{
    ActionOutcome, ActionType, ConditionOperator, EventOutcome, LogicalOperator, Notification,
    Rule, RuleAction, RuleCategory, RuleCondition, RuleExecutionResult,
};
