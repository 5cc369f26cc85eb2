//! Metric names and recording helpers
//!
//! Recording is a no-op until a binary installs a recorder.

use std::time::Duration;

/// Evaluations completed, labelled by final decision
pub const EVALUATIONS_TOTAL: &str = "loangraph_evaluations_total";

/// Evaluations aborted by a runtime error
pub const EVALUATION_ERRORS_TOTAL: &str = "loangraph_evaluation_errors_total";

/// Rules whose conditions were evaluated
pub const RULES_EVALUATED_TOTAL: &str = "loangraph_rules_evaluated_total";

/// References that resolved to neither a rule nor a terminal node
pub const MISSING_RULES_TOTAL: &str = "loangraph_missing_rules_total";

/// End-to-end evaluation latency
pub const EVALUATION_LATENCY_US: &str = "loangraph_evaluation_latency_us";

/// Register descriptions for every LoanGraph metric
pub fn describe_metrics() {
    metrics::describe_counter!(
        EVALUATIONS_TOTAL,
        "Total number of completed evaluations by decision"
    );
    metrics::describe_counter!(
        EVALUATION_ERRORS_TOTAL,
        "Total number of evaluations aborted by an error"
    );
    metrics::describe_counter!(
        RULES_EVALUATED_TOTAL,
        "Total number of rules evaluated across all chains"
    );
    metrics::describe_counter!(
        MISSING_RULES_TOTAL,
        "Total number of dangling rule references met during traversal"
    );
    metrics::describe_histogram!(
        EVALUATION_LATENCY_US,
        metrics::Unit::Microseconds,
        "Evaluation latency in microseconds"
    );
}

/// Record a completed evaluation
pub fn record_decision(decision: &str, elapsed: Duration) {
    metrics::counter!(EVALUATIONS_TOTAL, "decision" => decision.to_string()).increment(1);
    metrics::histogram!(EVALUATION_LATENCY_US).record(elapsed.as_micros() as f64);
}

/// Record an aborted evaluation
pub fn record_error(elapsed: Duration) {
    metrics::counter!(EVALUATION_ERRORS_TOTAL).increment(1);
    metrics::histogram!(EVALUATION_LATENCY_US).record(elapsed.as_micros() as f64);
}

/// Record traversal counters for one chain
pub fn record_traversal(rules_evaluated: u64, missing_rules: u64) {
    metrics::counter!(RULES_EVALUATED_TOTAL).increment(rules_evaluated);
    if missing_rules > 0 {
        metrics::counter!(MISSING_RULES_TOTAL).increment(missing_rules);
    }
}
