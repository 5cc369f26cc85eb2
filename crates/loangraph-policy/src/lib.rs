//! LoanGraph Policy Engine
//!
//! Declarative decision-graph engine for credit policies.
//!
//! A policy is a graph of rules grouped into rulesets and chains:
//! - Conditions compare applicant fields against literals
//! - Actions route traversal to next rules, rulesets, or branches
//! - Chains run in order and must all pass for the applicant to be accepted
//!
//! Every evaluation returns a full execution log for audit. Policies can
//! also be exported as a node/link graph for rendering.

pub mod action;
pub mod condition;
pub mod engine;
pub mod executor;
pub mod index;
pub mod lint;
pub mod rule;
pub mod visualize;

pub use action::{Action, ActionBranch, ActionPath, Transition};
pub use condition::{resolve, Comparison, Condition, Operator};
pub use engine::{DecisionMode, PolicyEngine};
pub use executor::{ChainExecutor, ChainOutcome};
pub use index::{RuleIndex, RuleLocation};
pub use lint::{ensure_clean, lint, LintWarning};
pub use rule::{Chain, PolicyGraph, Rule, RuleSet, TerminalNode};
pub use visualize::{to_visual_graph, VisualGraph, VisualLink, VisualNode};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::action::{Action, ActionBranch, ActionPath, Transition};
    pub use crate::condition::{Condition, Operator};
    pub use crate::engine::{DecisionMode, PolicyEngine};
    pub use crate::rule::{Chain, PolicyGraph, Rule, RuleSet, TerminalNode};
    pub use crate::visualize::{to_visual_graph, VisualGraph};
    pub use loangraph_core::{DecisionResult, EvaluationFailure};
}
