//! Policy evaluation engine

use std::sync::Arc;
use std::time::Instant;

use loangraph_core::instrumentation;
use loangraph_core::{ChainStatus, DecisionResult, EvaluationFailure, ExecutionLog, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::executor::ChainExecutor;
use crate::rule::PolicyGraph;

/// How the decision of a fully passing evaluation is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    /// Always report the first declared terminal node
    #[default]
    FirstTerminal,
    /// Report the last terminal node reached by traversal, falling back to the first
    ReachedTerminal,
}

/// Evaluates applicants against one shared policy graph
///
/// The engine holds no per-run state; each call to [`PolicyEngine::evaluate`]
/// builds its own execution log, queue, and visited set, so one engine can
/// serve many applicants, including from several threads at once.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    graph: Arc<PolicyGraph>,
    decision_mode: DecisionMode,
}

impl PolicyEngine {
    /// Create an engine over a validated graph
    pub fn new(graph: impl Into<Arc<PolicyGraph>>) -> Self {
        Self {
            graph: graph.into(),
            decision_mode: DecisionMode::default(),
        }
    }

    /// Parse policy JSON and create an engine over it
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::new(PolicyGraph::from_json(text)?))
    }

    /// Set the decision mode
    pub fn with_decision_mode(mut self, decision_mode: DecisionMode) -> Self {
        self.decision_mode = decision_mode;
        self
    }

    pub fn graph(&self) -> &PolicyGraph {
        &self.graph
    }

    pub fn decision_mode(&self) -> DecisionMode {
        self.decision_mode
    }

    /// Evaluate one applicant record
    ///
    /// Chains run in declared order; the first failing chain rejects the
    /// applicant and later chains never run. A runtime error aborts the run
    /// and returns the partial log inside [`EvaluationFailure`].
    pub fn evaluate(&self, applicant: &Value) -> std::result::Result<DecisionResult, EvaluationFailure> {
        let started = Instant::now();
        let mut log = ExecutionLog::new();

        match self.run(applicant, &mut log) {
            Ok(Verdict::Rejected(reason)) => {
                log.final_decision(loangraph_core::REJECTED);
                info!(policy = %self.graph.id(), reason = %reason, "Applicant rejected");
                instrumentation::record_decision(loangraph_core::REJECTED, started.elapsed());
                Ok(DecisionResult::rejected(reason, log))
            }
            Ok(Verdict::Accepted(decision)) => {
                log.final_decision(&decision);
                info!(policy = %self.graph.id(), decision = %decision, "Applicant accepted");
                instrumentation::record_decision(&decision, started.elapsed());
                Ok(DecisionResult::accepted(decision, log))
            }
            Err(error) => {
                warn!(policy = %self.graph.id(), error = %error, "Evaluation aborted");
                instrumentation::record_error(started.elapsed());
                Err(EvaluationFailure::new(error, log))
            }
        }
    }

    fn run(&self, applicant: &Value, log: &mut ExecutionLog) -> Result<Verdict> {
        let executor = ChainExecutor::new(&self.graph);
        let mut reached_terminal: Option<String> = None;

        log.policy_started(self.graph.name());

        for chain in self.graph.chains() {
            log.chain_started(&chain.name);
            let outcome = executor.execute(chain, applicant, log)?;
            instrumentation::record_traversal(
                outcome.rules_evaluated as u64,
                outcome.missing_rules as u64,
            );

            if let ChainStatus::Fail { reason } = outcome.status {
                return Ok(Verdict::Rejected(reason));
            }
            if outcome.reached_terminal.is_some() {
                reached_terminal = outcome.reached_terminal;
            }
        }

        let terminal = match self.decision_mode {
            DecisionMode::FirstTerminal => None,
            DecisionMode::ReachedTerminal => reached_terminal
                .as_deref()
                .and_then(|id| self.graph.terminal(id)),
        }
        .unwrap_or_else(|| self.graph.default_terminal());

        Ok(Verdict::Accepted(terminal.decision.clone()))
    }
}

enum Verdict {
    Rejected(String),
    Accepted(String),
}
