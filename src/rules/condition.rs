//! Condition evaluation over events
//!
//! A missing field makes `exists` false and every comparison operator
//! false; evaluation never errors. Multi-condition lists fold strictly
//! left-to-right using each condition's declared combinator.

use crate::events::{EventContext, SystemEvent};
use crate::rules::types::{ConditionOperator, LogicalOperator, RuleCondition};
use crate::telemetry::TelemetryCollector;
use serde_json::Value;

/// Evaluate a single condition against an event and context
pub fn evaluate_condition(
    condition: &RuleCondition,
    event: &SystemEvent,
    context: &EventContext,
    telemetry: &TelemetryCollector,
) -> bool {
    let actual = event.resolve_path(context, &condition.field);

    match condition.operator {
        ConditionOperator::Exists => actual.is_some(),
        ConditionOperator::NotExists => actual.is_none(),
        _ => {
            let Some(actual) = actual else {
                return false;
            };
            compare(&actual, condition, telemetry)
        }
    }
}

fn compare(actual: &Value, condition: &RuleCondition, telemetry: &TelemetryCollector) -> bool {
    let expected = &condition.value;
    match condition.operator {
        ConditionOperator::Equals => actual == expected,
        ConditionOperator::NotEquals => actual != expected,
        ConditionOperator::Contains => contains(actual, expected),
        ConditionOperator::NotContains => !contains(actual, expected),
        ConditionOperator::GreaterThan => numeric_cmp(actual, expected, |a, b| a > b),
        ConditionOperator::LessThan => numeric_cmp(actual, expected, |a, b| a < b),
        ConditionOperator::GreaterEqual => numeric_cmp(actual, expected, |a, b| a >= b),
        ConditionOperator::LessEqual => numeric_cmp(actual, expected, |a, b| a <= b),
        ConditionOperator::StartsWith => match (actual.as_str(), expected.as_str()) {
            (Some(s), Some(prefix)) => s.starts_with(prefix),
            _ => false,
        },
        ConditionOperator::EndsWith => match (actual.as_str(), expected.as_str()) {
            (Some(s), Some(suffix)) => s.ends_with(suffix),
            _ => false,
        },
        ConditionOperator::In => match expected.as_array() {
            Some(items) => items.contains(actual),
            None => false,
        },
        ConditionOperator::NotIn => match expected.as_array() {
            Some(items) => !items.contains(actual),
            None => false,
        },
        ConditionOperator::RegexMatch => match (actual.as_str(), expected.as_str()) {
            (Some(s), Some(pattern)) => match regex::Regex::new(pattern) {
                Ok(re) => re.is_match(s),
                Err(e) => {
                    telemetry.warn("condition", format!("invalid regex {pattern:?}: {e}"));
                    false
                }
            },
            _ => false,
        },
        ConditionOperator::Exists | ConditionOperator::NotExists => unreachable!(),
    }
}

/// String containment for strings, element containment for arrays
fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual.as_str(), expected.as_str()) {
        (Some(haystack), Some(needle)) => haystack.contains(needle),
        _ => match actual.as_array() {
            Some(items) => items.contains(expected),
            None => false,
        },
    }
}

fn numeric_cmp(actual: &Value, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Fold a condition list left-to-right. Each condition's `logical`
/// combinator links it to the NEXT one (default And); `Not` folds as
/// `acc && !next`. An empty list matches.
pub fn evaluate_conditions(
    conditions: &[RuleCondition],
    event: &SystemEvent,
    context: &EventContext,
    telemetry: &TelemetryCollector,
) -> bool {
    let Some(first) = conditions.first() else {
        return true;
    };

    let mut acc = evaluate_condition(first, event, context, telemetry);
    let mut combinator = first.logical.unwrap_or(LogicalOperator::And);

    for condition in &conditions[1..] {
        let current = evaluate_condition(condition, event, context, telemetry);
        acc = match combinator {
            LogicalOperator::And => acc && current,
            LogicalOperator::Or => acc || current,
            LogicalOperator::Not => acc && !current,
        };
        combinator = condition.logical.unwrap_or(LogicalOperator::And);
    }

    acc
}
