//! Rule data model: conditions, actions, execution results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rule categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Personal,
    Project,
    Technical,
    Quality,
    Security,
}

/// Condition comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    RegexMatch,
    Exists,
    NotExists,
}

/// Combinator linking a condition to the next one in the list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

/// A single condition over an event/context field path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Dot-path into the event or context, e.g. `data.path`, `context.userId`
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
    /// How this condition combines with the NEXT one; `None` means And
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical: Option<LogicalOperator>,
}

impl RuleCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            logical: None,
        }
    }

    /// Set the combinator to the next condition
    pub fn with_logical(mut self, logical: LogicalOperator) -> Self {
        self.logical = Some(logical);
        self
    }
}

/// Typed rule actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Log,
    Notify,
    Modify,
    Block,
    Enhance,
    StoreMemory,
}

/// A rule action with parameters. Actions run in declared list order;
/// `priority` is metadata carried for callers, not an execution key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub priority: i32,
}

impl RuleAction {
    pub fn new(action_type: ActionType, parameters: Value) -> Self {
        Self {
            action_type,
            parameters,
            priority: 0,
        }
    }
}

/// A declarative trigger/action pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub category: RuleCategory,
    /// Higher priority evaluates first
    pub priority: i32,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
    pub is_active: bool,
    /// Set on dynamically generated rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Rule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: RuleCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            priority: 0,
            conditions: Vec::new(),
            actions: Vec::new(),
            is_active: true,
            generated_at: None,
            expires_at: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Whether a generated rule has passed its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// True when the condition list mixes And/Or/Not combinators. Such
    /// rules still evaluate as a strict left fold, but are worth manual
    /// review; the engine logs a warning when one is registered.
    pub fn uses_mixed_operators(&self) -> bool {
        let mut seen: Option<LogicalOperator> = None;
        for condition in &self.conditions {
            let op = condition.logical.unwrap_or(LogicalOperator::And);
            match seen {
                None => seen = Some(op),
                Some(prev) if prev != op => return true,
                Some(_) => {}
            }
        }
        false
    }
}

/// Outcome of a single action
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub action_type: ActionType,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-rule execution record for one engine pass
#[derive(Debug, Clone)]
pub struct RuleExecutionResult {
    pub rule_id: String,
    pub rule_name: String,
    pub success: bool,
    pub actions: Vec<ActionOutcome>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A notification emitted by a `notify` action
#[derive(Debug, Clone)]
pub struct Notification {
    pub rule_id: String,
    pub message: String,
    pub channel: Option<String>,
}

/// Aggregate outcome of one `process_event` pass
#[derive(Debug, Clone, Default)]
pub struct EventOutcome {
    /// One entry per matched rule, in evaluation order
    pub results: Vec<RuleExecutionResult>,
    /// Set by a `block` action
    pub blocked: bool,
    /// Accumulated `modify`/`enhance` output
    pub modified_data: Value,
    pub notifications: Vec<Notification>,
    /// Ids of memories synthesized by `store_memory` actions
    pub stored_memory_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_builder() {
        let rule = Rule::new("r1", "High severity alert", RuleCategory::Security)
            .with_priority(10)
            .with_condition(RuleCondition::new(
                "severity",
                ConditionOperator::Equals,
                json!("critical"),
            ))
            .with_action(RuleAction::new(ActionType::Notify, json!({"message": "alert"})));

        assert_eq!(rule.priority, 10);
        assert_eq!(rule.conditions.len(), 1);
        assert!(rule.is_active);
        assert!(!rule.is_expired(Utc::now()));
    }

    #[test]
    fn test_mixed_operator_detection() {
        let uniform = Rule::new("r1", "uniform", RuleCategory::Technical)
            .with_condition(
                RuleCondition::new("a", ConditionOperator::Exists, json!(null))
                    .with_logical(LogicalOperator::And),
            )
            .with_condition(RuleCondition::new("b", ConditionOperator::Exists, json!(null)));
        assert!(!uniform.uses_mixed_operators());

        let mixed = Rule::new("r2", "mixed", RuleCategory::Technical)
            .with_condition(
                RuleCondition::new("a", ConditionOperator::Exists, json!(null))
                    .with_logical(LogicalOperator::Or),
            )
            .with_condition(
                RuleCondition::new("b", ConditionOperator::Exists, json!(null))
                    .with_logical(LogicalOperator::And),
            );
        assert!(mixed.uses_mixed_operators());
    }

    #[test]
    fn test_operator_serde_snake_case() {
        let json = serde_json::to_string(&ConditionOperator::GreaterEqual).unwrap();
        assert_eq!(json, "\"greater_equal\"");
        let back: ConditionOperator = serde_json::from_str("\"regex_match\"").unwrap();
        assert_eq!(back, ConditionOperator::RegexMatch);
    }

    #[test]
    fn test_expired_rule() {
        let mut rule = Rule::new("r1", "ttl", RuleCategory::Technical);
        rule.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(rule.is_expired(Utc::now()));
    }
}
