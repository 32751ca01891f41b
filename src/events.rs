//! Structured system events delivered to the rule engine
//!
//! Events arrive from an external source; the engine evaluates rule
//! conditions against an event plus an execution context via dot-path
//! field resolution. Missing paths resolve to `None`, never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Execution context supplied alongside an event
pub type EventContext = HashMap<String, Value>;

/// A structured system event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    /// Unique event identifier
    pub id: String,
    /// Event type label, e.g. "file_changed", "task_completed"
    #[serde(rename = "type")]
    pub event_type: String,
    /// Originating component
    pub source: String,
    /// Open event payload
    #[serde(default)]
    pub data: Value,
    /// Delivery timestamp
    pub timestamp: DateTime<Utc>,
    /// Event severity
    pub severity: Severity,
}

impl SystemEvent {
    /// Create a new event with a generated id and current timestamp
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            source: source.into(),
            data: Value::Null,
            timestamp: Utc::now(),
            severity: Severity::Info,
        }
    }

    /// Attach a payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Override the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Resolve a dot-path against this event and the execution context.
    ///
    /// Top-level names: `id`, `type`, `source`, `severity`, `timestamp`,
    /// `data.*` and `context.*`. A bare name that is none of these is
    /// looked up in `data` first, then in the context.
    pub fn resolve_path(&self, context: &EventContext, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let head = parts.next()?;
        let rest: Vec<&str> = parts.collect();

        let root: Value = match head {
            "id" => Value::String(self.id.clone()),
            "type" => Value::String(self.event_type.clone()),
            "source" => Value::String(self.source.clone()),
            "severity" => serde_json::to_value(self.severity).ok()?,
            "timestamp" => Value::String(self.timestamp.to_rfc3339()),
            "data" => self.data.clone(),
            "context" => {
                if rest.is_empty() {
                    return serde_json::to_value(context).ok();
                }
                let value = context.get(rest[0])?.clone();
                return descend(value, &rest[1..]);
            }
            other => {
                // Bare field: data takes precedence over context
                if let Some(value) = self.data.get(other) {
                    return descend(value.clone(), &rest);
                }
                let value = context.get(other)?.clone();
                return descend(value, &rest);
            }
        };

        descend(root, &rest)
    }
}

fn descend(value: Value, parts: &[&str]) -> Option<Value> {
    let mut current = value;
    for part in parts {
        current = current.get(part)?.clone();
    }
    Some(current)
}
