//! Conditional rules: boolean combinations of sub-conditions
//!
//! Sub-conditions reference a registered rule, a parsed expression, or a
//! named custom evaluator. Evaluation failures are caught and treated as
//! non-matches, never propagated.

use crate::rules::types::{ActionOutcome, Notification, RuleAction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How sub-condition results combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Every sub-condition must match
    All,
    /// At least one must match
    Any,
    /// None may match
    None,
    /// Strictly more than half must match
    Majority,
}

impl EvaluationMode {
    /// Combine match count over total per this mode
    pub fn combine(&self, matched: usize, total: usize) -> bool {
        match self {
            EvaluationMode::All => total > 0 && matched == total,
            EvaluationMode::Any => matched > 0,
            EvaluationMode::None => matched == 0,
            EvaluationMode::Majority => matched * 2 > total,
        }
    }
}

/// A single sub-condition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubCondition {
    /// Matches when the referenced rule's conditions hold
    RuleRef { rule_id: String },
    /// A parsed boolean expression over event/context paths
    Expression { expression: String },
    /// A registered custom evaluator, looked up by name
    Custom { evaluator: String },
}

/// A conditional rule: sub-conditions, a combination mode, bound actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub id: String,
    pub name: String,
    pub conditions: Vec<SubCondition>,
    pub evaluation_mode: EvaluationMode,
    pub actions: Vec<RuleAction>,
}

impl ConditionalRule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        evaluation_mode: EvaluationMode,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            conditions: Vec::new(),
            evaluation_mode,
            actions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: SubCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// Outcome of a conditional-rule evaluation
#[derive(Debug, Clone)]
pub struct ConditionalOutcome {
    pub conditional_id: String,
    /// Whether the combination held AND bound actions all succeeded
    pub success: bool,
    /// Whether the combination held
    pub combination_matched: bool,
    /// Indices (into `conditions`) of sub-conditions that matched
    pub matched_conditions: Vec<usize>,
    pub actions: Vec<ActionOutcome>,
    pub notifications: Vec<Notification>,
    pub stored_memory_ids: Vec<String>,
    pub modified_data: Value,
    pub blocked: bool,
    pub error: Option<String>,
}
