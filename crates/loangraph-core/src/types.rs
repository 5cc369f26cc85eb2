//! Core types for LoanGraph evaluations

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;

/// Decision label returned when any chain fails
pub const REJECTED: &str = "REJECTED";

/// Reason recorded when a failing rule declares none
pub const DEFAULT_FAIL_REASON: &str = "Failed condition";

/// Final outcome of evaluating one applicant against a policy graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResult {
    /// Decision label, either `REJECTED` or a terminal node's decision
    pub final_decision: String,

    /// Failing reason; `None` when every chain passed
    pub reason: Option<String>,

    /// Ordered trace of the evaluation, returned in full for audit
    pub execution_log: Vec<String>,
}

impl DecisionResult {
    /// Create a rejection carrying the failing reason
    pub fn rejected(reason: impl Into<String>, execution_log: ExecutionLog) -> Self {
        Self {
            final_decision: REJECTED.to_string(),
            reason: Some(reason.into()),
            execution_log: execution_log.into_lines(),
        }
    }

    /// Create an accepting decision taken from a terminal node
    pub fn accepted(decision: impl Into<String>, execution_log: ExecutionLog) -> Self {
        Self {
            final_decision: decision.into(),
            reason: None,
            execution_log: execution_log.into_lines(),
        }
    }

    /// Whether the applicant was rejected
    pub fn is_rejected(&self) -> bool {
        self.final_decision == REJECTED
    }
}

/// Status of a single chain after traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum ChainStatus {
    /// Queue drained without any failing rule
    Pass,
    /// A rule failed and short-circuited the chain
    Fail {
        /// Reason taken from the failing rule's `on_false` path
        reason: String,
    },
}

impl ChainStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Evaluation aborted by a runtime error
///
/// Carries whatever trace was accumulated before the error so callers can
/// debug the policy. This is never a decision.
#[derive(Debug, thiserror::Error)]
#[error("evaluation failed: {error}")]
pub struct EvaluationFailure {
    /// The underlying error
    #[source]
    pub error: Error,

    /// Partial trace up to the failure point
    pub execution_log: Vec<String>,
}

impl EvaluationFailure {
    pub fn new(error: Error, execution_log: ExecutionLog) -> Self {
        Self {
            error,
            execution_log: execution_log.into_lines(),
        }
    }
}

/// Human-readable trace of one evaluation
///
/// A fresh log is created per evaluation and threaded through traversal by
/// mutable reference. Every entry is mirrored to `tracing`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionLog {
    lines: Vec<String>,
}

impl ExecutionLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw line
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn policy_started(&mut self, policy_name: &str) {
        debug!(policy = %policy_name, "Executing policy");
        self.push(format!("========== EXECUTING POLICY: {} ==========", policy_name));
    }

    pub fn chain_started(&mut self, chain_name: &str) {
        debug!(chain = %chain_name, "Executing chain");
        self.push(format!("=== Executing chain: {} ===", chain_name));
    }

    pub fn rule_entered(&mut self, rule_id: &str, rule_name: Option<&str>) {
        debug!(rule = %rule_id, "Evaluating rule");
        self.push(format!(
            "Evaluating rule: {} - {}",
            rule_id,
            rule_name.unwrap_or_default()
        ));
    }

    pub fn rule_passed(&mut self, rule_id: &str) {
        debug!(rule = %rule_id, "Rule passed");
        self.push(format!("PASS: {}", rule_id));
    }

    pub fn rule_failed(&mut self, rule_id: &str, reason: &str) {
        debug!(rule = %rule_id, reason = %reason, "Rule failed");
        self.push(format!("FAIL: {}", reason));
    }

    pub fn branch_taken(&mut self, rule_id: &str, branch_name: &str) {
        debug!(rule = %rule_id, branch = %branch_name, "Branch taken");
        self.push(format!("Branch taken: {}", branch_name));
    }

    pub fn missing_rule(&mut self, rule_id: &str) {
        warn!(rule = %rule_id, "Referenced rule not found; treating as dead end");
        self.push(format!("WARNING: Missing rule: {}", rule_id));
    }

    pub fn terminal_reached(&mut self, terminal_id: &str, decision: &str) {
        debug!(terminal = %terminal_id, decision = %decision, "Reached terminal node");
        self.push(format!("Reached terminal: {} ({})", terminal_id, decision));
    }

    pub fn incompatible_comparison(&mut self, field: &str, detail: &str) {
        warn!(field = %field, detail = %detail, "Incompatible comparison; condition fails");
        self.push(format!(
            "WARNING: Incompatible comparison on '{}': {}",
            field, detail
        ));
    }

    pub fn final_decision(&mut self, decision: &str) {
        self.push(format!("FINAL DECISION: {}", decision));
    }

    /// Recorded lines in order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Consume the log, returning its lines
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
