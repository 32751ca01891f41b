//! Core data types for the memory store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Memory record classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    ShortTerm,
    LongTerm,
    Working,
    Episodic,
    Semantic,
    Procedural,
    Consolidated,
}

/// What happens to originals after consolidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Originals stay, marked consolidated with a `consolidated_into` link
    KeepWithBackLink,
    /// Originals are removed once the merged record exists
    RemoveOriginals,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::KeepWithBackLink
    }
}

/// Structured memory context: well-known optional keys plus an open
/// extension bag for arbitrary additional keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl MemoryContext {
    /// Partial match: every key present in `subset` must match this
    /// context; keys absent from `subset` are ignored.
    pub fn matches(&self, subset: &MemoryContext) -> bool {
        fn field_matches(ours: &Option<String>, theirs: &Option<String>) -> bool {
            match theirs {
                Some(expected) => ours.as_deref() == Some(expected.as_str()),
                None => true,
            }
        }

        field_matches(&self.session_id, &subset.session_id)
            && field_matches(&self.user_id, &subset.user_id)
            && field_matches(&self.project_id, &subset.project_id)
            && field_matches(&self.task_id, &subset.task_id)
            && field_matches(&self.domain, &subset.domain)
            && subset
                .extra
                .iter()
                .all(|(key, expected)| self.extra.get(key) == Some(expected))
    }

    /// True when no key is set
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none()
            && self.user_id.is_none()
            && self.project_id.is_none()
            && self.task_id.is_none()
            && self.domain.is_none()
            && self.extra.is_empty()
    }
}

/// A single stored fact or event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique, immutable identifier
    pub id: String,
    /// Memory content text
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Importance on the configured scale (0..=scale)
    pub importance: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub context: MemoryContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consolidated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consolidated_into: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consolidated_from: Vec<String>,
}

impl Memory {
    /// Create a memory with a generated id and current timestamps
    pub fn new(content: impl Into<String>, memory_type: MemoryType) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            summary: None,
            memory_type,
            importance: 0.5,
            tags: BTreeSet::new(),
            context: MemoryContext::default(),
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            access_count: 0,
            expires_at: None,
            consolidated: false,
            consolidated_into: None,
            consolidated_from: Vec::new(),
        }
    }

    /// Set importance
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    /// Set tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set context
    pub fn with_context(mut self, context: MemoryContext) -> Self {
        self.context = context;
        self
    }

    /// Set expiry
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether this memory has expired as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Label used for the mirrored graph node
    pub fn display_label(&self) -> String {
        let text = self.summary.as_deref().unwrap_or(&self.content);
        if text.chars().count() > 80 {
            let truncated: String = text.chars().take(77).collect();
            format!("{truncated}...")
        } else {
            text.to_string()
        }
    }
}

/// Partial update for a memory; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub content: Option<String>,
    pub summary: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub importance: Option<f64>,
    pub tags: Option<BTreeSet<String>>,
    pub context: Option<MemoryContext>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_memory_defaults() {
        let memory = Memory::new("Learned about borrow checking", MemoryType::Semantic);
        assert!(!memory.id.is_empty());
        assert_eq!(memory.importance, 0.5);
        assert!(!memory.consolidated);
        assert_eq!(memory.access_count, 0);
    }

    #[test]
    fn test_expiry_check() {
        let now = Utc::now();
        let expired = Memory::new("old", MemoryType::ShortTerm).with_expiry(now - Duration::seconds(1));
        let live = Memory::new("new", MemoryType::ShortTerm).with_expiry(now + Duration::hours(1));
        let forever = Memory::new("keep", MemoryType::LongTerm);

        assert!(expired.is_expired(now));
        assert!(!live.is_expired(now));
        assert!(!forever.is_expired(now));
    }

    #[test]
    fn test_context_partial_match() {
        let stored = MemoryContext {
            session_id: Some("s1".to_string()),
            user_id: Some("u1".to_string()),
            extra: [("team".to_string(), json!("core"))].into_iter().collect(),
            ..Default::default()
        };

        let want_user = MemoryContext {
            user_id: Some("u1".to_string()),
            ..Default::default()
        };
        assert!(stored.matches(&want_user));

        let want_extra = MemoryContext {
            extra: [("team".to_string(), json!("core"))].into_iter().collect(),
            ..Default::default()
        };
        assert!(stored.matches(&want_extra));

        let wrong_user = MemoryContext {
            user_id: Some("u2".to_string()),
            ..Default::default()
        };
        assert!(!stored.matches(&wrong_user));
    }

    #[test]
    fn test_memory_type_serde_snake_case() {
        let json = serde_json::to_string(&MemoryType::ShortTerm).unwrap();
        assert_eq!(json, "\"short_term\"");
        let back: MemoryType = serde_json::from_str("\"episodic\"").unwrap();
        assert_eq!(back, MemoryType::Episodic);
    }

    #[test]
    fn test_display_label_truncates() {
        let memory = Memory::new("x".repeat(200), MemoryType::LongTerm);
        assert!(memory.display_label().chars().count() <= 80);
        assert!(memory.display_label().ends_with("..."));
    }
}
