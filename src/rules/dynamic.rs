//! Dynamic rule generation: TTL-bounded rules synthesized at runtime
//!
//! Generators are registered functions producing new rules from an event
//! and context. Admitted rules are capped, stamped with an expiry, and
//! retracted by a periodic sweep.

use crate::events::{EventContext, SystemEvent};
use crate::rules::types::Rule;

/// A registered rule generator
pub type GeneratorFn = dyn Fn(&SystemEvent, &EventContext) -> Vec<Rule> + Send + Sync;

/// Per-generator admission policy
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Cap on newly admitted rules per invocation
    pub max_rules: usize,
    /// Lifetime of each generated rule
    pub ttl_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_rules: 10,
            ttl_ms: 60_000,
        }
    }
}

/// A generator registration
pub struct DynamicRuleGenerator {
    pub id: String,
    pub config: GeneratorConfig,
    pub generate: Box<GeneratorFn>,
}

impl DynamicRuleGenerator {
    pub fn new(
        id: impl Into<String>,
        config: GeneratorConfig,
        generate: impl Fn(&SystemEvent, &EventContext) -> Vec<Rule> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            config,
            generate: Box::new(generate),
        }
    }
}
