//! Policy authoring checks
//!
//! None of these conditions stop a policy from loading or running; they
//! point at places where traversal will hit a dead end, fail at runtime, or
//! depend on queue order. Strict callers escalate them with [`ensure_clean`].

use std::collections::BTreeMap;
use std::fmt;

use loangraph_core::{Error, Result};
use serde::Serialize;
use tracing::warn;

use crate::action::Transition;
use crate::condition::Condition;
use crate::rule::{PolicyGraph, Rule};

/// A single authoring problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LintWarning {
    /// Operator token outside the supported set
    UnknownOperator {
        rule_id: String,
        field: String,
        operator: String,
    },
    /// `next_rules` id that names neither a rule nor a terminal node
    DanglingReference { rule_id: String, target: String },
    /// Branch or `next_ruleset` target that names no ruleset
    UnresolvedRuleset { rule_id: String, ruleset: String },
    /// Rule reachable from several rules; evaluated once, on the first path to reach it
    MultiplePredecessors {
        rule_id: String,
        predecessors: Vec<String>,
    },
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOperator {
                rule_id,
                field,
                operator,
            } => write!(
                f,
                "rule '{}': unknown operator '{}' on field '{}'",
                rule_id, operator, field
            ),
            Self::DanglingReference { rule_id, target } => {
                write!(f, "rule '{}': next rule '{}' does not exist", rule_id, target)
            }
            Self::UnresolvedRuleset { rule_id, ruleset } => {
                write!(f, "rule '{}': ruleset '{}' does not exist", rule_id, ruleset)
            }
            Self::MultiplePredecessors {
                rule_id,
                predecessors,
            } => write!(
                f,
                "rule '{}' is reachable from {}; it is evaluated only on the first path to reach it",
                rule_id,
                predecessors.join(", ")
            ),
        }
    }
}

/// Check a graph for authoring problems, in declaration order
pub fn lint(graph: &PolicyGraph) -> Vec<LintWarning> {
    let mut warnings = Vec::new();
    let mut predecessors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (_, rule) in graph.rules() {
        check_operators(rule, &rule.conditions, &mut warnings);

        for path in [&rule.action.on_true, &rule.action.on_false] {
            match &path.transition {
                Transition::End => {}
                Transition::NextRules(ids) => {
                    for id in ids {
                        if !graph.index().contains_rule(id) && graph.terminal(id).is_none() {
                            warnings.push(LintWarning::DanglingReference {
                                rule_id: rule.id.clone(),
                                target: id.clone(),
                            });
                        }
                    }
                }
                Transition::NextRuleset(ruleset) => {
                    check_ruleset(graph, rule, ruleset, &mut warnings)
                }
                Transition::Branches(branches) => {
                    for branch in branches {
                        check_operators(rule, &branch.conditions, &mut warnings);
                        check_ruleset(graph, rule, &branch.target, &mut warnings);
                    }
                }
            }
        }

        for successor in pass_successors(graph, rule) {
            let entry = predecessors.entry(successor).or_default();
            if !entry.contains(&rule.id.as_str()) {
                entry.push(&rule.id);
            }
        }
    }

    for (rule_id, preds) in predecessors {
        if preds.len() > 1 && graph.index().contains_rule(rule_id) {
            warnings.push(LintWarning::MultiplePredecessors {
                rule_id: rule_id.to_string(),
                predecessors: preds.into_iter().map(str::to_string).collect(),
            });
        }
    }

    warnings
}

/// Fail with [`Error::InvalidPolicy`] when the graph has any lint warning
pub fn ensure_clean(graph: &PolicyGraph) -> Result<()> {
    let warnings = lint(graph);
    if warnings.is_empty() {
        return Ok(());
    }

    for warning in &warnings {
        warn!(policy = %graph.id(), "{}", warning);
    }

    let summary: Vec<String> = warnings.iter().map(ToString::to_string).collect();
    Err(Error::invalid_policy(summary.join("; ")))
}

/// Ids a passing rule may enqueue; unresolved rulesets enqueue nothing
fn pass_successors<'g>(graph: &'g PolicyGraph, rule: &'g Rule) -> Vec<&'g str> {
    match &rule.action.on_true.transition {
        Transition::End => Vec::new(),
        Transition::NextRules(ids) => ids.iter().map(String::as_str).collect(),
        Transition::NextRuleset(ruleset) => graph.ruleset_entry(ruleset).into_iter().collect(),
        Transition::Branches(branches) => branches
            .iter()
            .filter_map(|branch| graph.ruleset_entry(&branch.target))
            .collect(),
    }
}

fn check_operators(rule: &Rule, conditions: &[Condition], warnings: &mut Vec<LintWarning>) {
    for condition in conditions {
        if condition.operator().is_err() {
            warnings.push(LintWarning::UnknownOperator {
                rule_id: rule.id.clone(),
                field: condition.field.clone(),
                operator: condition.operator.clone(),
            });
        }
    }
}

fn check_ruleset(graph: &PolicyGraph, rule: &Rule, ruleset: &str, warnings: &mut Vec<LintWarning>) {
    if graph.ruleset_entry(ruleset).is_none() {
        warnings.push(LintWarning::UnresolvedRuleset {
            rule_id: rule.id.clone(),
            ruleset: ruleset.to_string(),
        });
    }
}
