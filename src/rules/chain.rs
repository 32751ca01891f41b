//! Rule chains: ordered or parallel rule groups with shared failure policy
//!
//! A chain runs its rule ids sequentially (honoring `stop_on_failure`) or
//! fanned out in parallel; parallel mode is the one place where cross-rule
//! ordering is intentionally relaxed. Per-rule retry uses exponential
//! backoff, and the whole chain is bounded by a hard timeout.

use crate::rules::types::RuleExecutionResult;
use serde::{Deserialize, Serialize};

/// Chain lifecycle state machine: `Idle -> Running -> {Completed | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Execution policy and membership of a rule chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleChain {
    pub id: String,
    pub name: String,
    /// Rule ids, in execution order for sequential chains
    pub rule_ids: Vec<String>,
    /// Sequential mode: abort remaining steps after a failed one
    pub stop_on_failure: bool,
    /// Fan out all rules at once, forfeiting ordering guarantees
    pub parallel: bool,
    /// Hard budget for the whole chain
    pub timeout_ms: u64,
    /// Attempts per rule before its step is marked failed (minimum 1)
    pub retry_count: u32,
}

impl RuleChain {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rule_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rule_ids,
            stop_on_failure: true,
            parallel: false,
            timeout_ms: 30_000,
            retry_count: 1,
        }
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count.max(1);
        self
    }

    pub fn continue_on_failure(mut self) -> Self {
        self.stop_on_failure = false;
        self
    }
}

/// Outcome of one chain step (one rule id)
#[derive(Debug, Clone)]
pub struct ChainStepResult {
    pub rule_id: String,
    /// Whether the rule's conditions held; a non-matching rule is a
    /// successful no-op step
    pub matched: bool,
    pub success: bool,
    pub attempts: u32,
    pub execution: Option<RuleExecutionResult>,
    pub error: Option<String>,
}

/// Outcome of a whole chain run
#[derive(Debug, Clone)]
pub struct ChainResult {
    pub chain_id: String,
    pub state: ChainState,
    pub success: bool,
    pub steps: Vec<ChainStepResult>,
    pub timed_out: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Backoff delay before retry `attempt` (0-based): `base * 2^attempt`
pub fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_builder_defaults() {
        let chain = RuleChain::new("c1", "validation chain", vec!["r1".to_string()]);
        assert!(chain.stop_on_failure);
        assert!(!chain.parallel);
        assert_eq!(chain.retry_count, 1);
    }

    #[test]
    fn test_retry_count_floor() {
        let chain = RuleChain::new("c1", "x", vec![]).with_retry_count(0);
        assert_eq!(chain.retry_count, 1);
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay_ms(1000, 0), 1000);
        assert_eq!(backoff_delay_ms(1000, 1), 2000);
        assert_eq!(backoff_delay_ms(1000, 2), 4000);
        assert_eq!(backoff_delay_ms(1000, 3), 8000);
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(backoff_delay_ms(u64::MAX, 1), u64::MAX);
    }
}
