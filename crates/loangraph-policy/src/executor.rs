//! Chain executor
//!
//! Breadth-first traversal of one chain's rule graph:
//! - The queue is seeded with the chain's entry rule
//! - Each id is evaluated at most once, so cycles terminate
//! - Ids that resolve to no rule are dead ends (logged, not fatal)
//! - The first failing rule ends the whole chain with its reason
//!
//! A rule reachable from several predecessors is evaluated once, on
//! whichever path reaches the queue first. On graphs that are not DAGs the
//! outcome therefore depends on queue order.

use std::collections::{HashSet, VecDeque};

use loangraph_core::{ChainStatus, ExecutionLog, Result, DEFAULT_FAIL_REASON};
use serde_json::Value;

use crate::action::Transition;
use crate::condition::all_pass;
use crate::rule::{Chain, PolicyGraph, Rule};

/// Result of traversing one chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    pub status: ChainStatus,

    /// Last terminal node id popped from the queue, if any
    pub reached_terminal: Option<String>,

    /// Rules whose conditions were evaluated
    pub rules_evaluated: usize,

    /// Ids that resolved to neither a rule nor a terminal node
    pub missing_rules: usize,
}

/// Outcome of evaluating a single rule
enum Step {
    Fail(String),
    Continue(Vec<String>),
}

/// Traverses chains of a policy graph
pub struct ChainExecutor<'g> {
    graph: &'g PolicyGraph,
}

impl<'g> ChainExecutor<'g> {
    pub fn new(graph: &'g PolicyGraph) -> Self {
        Self { graph }
    }

    /// Run one chain against an applicant record
    ///
    /// Queue and visited set are local to this call.
    pub fn execute(
        &self,
        chain: &Chain,
        applicant: &Value,
        log: &mut ExecutionLog,
    ) -> Result<ChainOutcome> {
        let mut outcome = ChainOutcome {
            status: ChainStatus::Pass,
            reached_terminal: None,
            rules_evaluated: 0,
            missing_rules: 0,
        };

        let mut queue: VecDeque<String> = chain
            .entry_rule()
            .map(|rule| rule.id.clone())
            .into_iter()
            .collect();
        let mut visited: HashSet<String> = HashSet::new();

        while let Some(rule_id) = queue.pop_front() {
            if !visited.insert(rule_id.clone()) {
                continue;
            }

            let Some(rule) = self.graph.rule(&rule_id) else {
                match self.graph.terminal(&rule_id) {
                    Some(terminal) => {
                        log.terminal_reached(&terminal.id, &terminal.decision);
                        outcome.reached_terminal = Some(terminal.id.clone());
                    }
                    None => {
                        log.missing_rule(&rule_id);
                        outcome.missing_rules += 1;
                    }
                }
                continue;
            };

            outcome.rules_evaluated += 1;
            match self.step(rule, applicant, log, &mut outcome)? {
                Step::Fail(reason) => {
                    outcome.status = ChainStatus::Fail { reason };
                    return Ok(outcome);
                }
                Step::Continue(successors) => queue.extend(successors),
            }
        }

        Ok(outcome)
    }

    fn step(
        &self,
        rule: &Rule,
        applicant: &Value,
        log: &mut ExecutionLog,
        outcome: &mut ChainOutcome,
    ) -> Result<Step> {
        log.rule_entered(&rule.id, rule.name.as_deref());

        if !all_pass(&rule.conditions, applicant, log)? {
            let reason = rule
                .action
                .on_false
                .reason
                .clone()
                .unwrap_or_else(|| DEFAULT_FAIL_REASON.to_string());
            log.rule_failed(&rule.id, &reason);
            return Ok(Step::Fail(reason));
        }

        log.rule_passed(&rule.id);
        self.successors(rule, applicant, log, outcome).map(Step::Continue)
    }

    /// Successor ids of a passing rule
    fn successors(
        &self,
        rule: &Rule,
        applicant: &Value,
        log: &mut ExecutionLog,
        outcome: &mut ChainOutcome,
    ) -> Result<Vec<String>> {
        let successors = match &rule.action.on_true.transition {
            Transition::End => Vec::new(),
            Transition::NextRules(ids) => ids.clone(),
            Transition::NextRuleset(ruleset_id) => {
                self.entry_of(ruleset_id, log, outcome).into_iter().collect()
            }
            Transition::Branches(branches) => {
                let mut selected = Vec::new();
                for branch in branches {
                    if all_pass(&branch.conditions, applicant, log)? {
                        log.branch_taken(&rule.id, &branch.name);
                        selected.extend(self.entry_of(&branch.target, log, outcome));
                        break;
                    }
                }
                selected
            }
        };

        Ok(successors)
    }

    /// Entry rule of a ruleset
    ///
    /// An unknown ruleset is a dead end, recorded here rather than enqueued,
    /// so it can never be mistaken for a rule or terminal with the same id.
    fn entry_of(
        &self,
        ruleset_id: &str,
        log: &mut ExecutionLog,
        outcome: &mut ChainOutcome,
    ) -> Option<String> {
        let entry = self.graph.ruleset_entry(ruleset_id).map(str::to_string);
        if entry.is_none() {
            log.missing_rule(ruleset_id);
            outcome.missing_rules += 1;
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionBranch, ActionPath};
    use crate::condition::{Condition, Operator};
    use crate::rule::{RuleSet, TerminalNode};
    use serde_json::json;

    fn rule(id: &str, conditions: Vec<Condition>, on_true: ActionPath) -> Rule {
        Rule::new(
            id,
            conditions,
            Action {
                on_true,
                on_false: ActionPath::end().with_reason(format!("{} failed", id)),
            },
        )
    }

    fn graph(rules: Vec<Rule>) -> PolicyGraph {
        PolicyGraph::new(
            "p",
            "Test",
            vec![Chain::new("c", "Chain", vec![RuleSet::new("rs", "Rules", rules)])],
            vec![TerminalNode::new("eligible", "ELIGIBLE")],
        )
        .unwrap()
    }

    fn run(graph: &PolicyGraph, applicant: &Value) -> (ChainOutcome, ExecutionLog) {
        let mut log = ExecutionLog::new();
        let outcome = ChainExecutor::new(graph)
            .execute(&graph.chains()[0], applicant, &mut log)
            .unwrap();
        (outcome, log)
    }

    #[test]
    fn test_fan_out_visits_all() {
        let graph = graph(vec![
            rule("a", vec![], ActionPath::next_rules(["b", "c"])),
            rule("b", vec![], ActionPath::end()),
            rule("c", vec![], ActionPath::end()),
        ]);

        let (outcome, log) = run(&graph, &json!({}));
        assert!(outcome.status.is_pass());
        assert_eq!(outcome.rules_evaluated, 3);
        assert_eq!(log.lines().last().unwrap(), "PASS: c");
    }

    #[test]
    fn test_cycle_terminates() {
        let graph = graph(vec![
            rule("a", vec![], ActionPath::next_rules(["b"])),
            rule("b", vec![], ActionPath::next_rules(["a", "b"])),
        ]);

        let (outcome, _) = run(&graph, &json!({}));
        assert!(outcome.status.is_pass());
        assert_eq!(outcome.rules_evaluated, 2);
    }

    #[test]
    fn test_failure_short_circuits_pending_queue() {
        let graph = graph(vec![
            rule("a", vec![], ActionPath::next_rules(["b", "c"])),
            rule("b", vec![Condition::new("x", Operator::Eq, 1)], ActionPath::end()),
            rule("c", vec![], ActionPath::end()),
        ]);

        let (outcome, log) = run(&graph, &json!({"x": 2}));
        assert_eq!(
            outcome.status,
            ChainStatus::Fail {
                reason: "b failed".to_string()
            }
        );
        assert_eq!(outcome.rules_evaluated, 2);
        assert!(!log.lines().iter().any(|line| line.contains("rule: c")));
        assert_eq!(log.lines().last().unwrap(), "FAIL: b failed");
    }

    #[test]
    fn test_default_fail_reason() {
        let graph = graph(vec![Rule::new(
            "a",
            vec![Condition::new("x", Operator::Eq, 1)],
            Action::default(),
        )]);

        let (outcome, _) = run(&graph, &json!({}));
        assert_eq!(
            outcome.status,
            ChainStatus::Fail {
                reason: DEFAULT_FAIL_REASON.to_string()
            }
        );
    }

    #[test]
    fn test_missing_rule_is_dead_end() {
        let graph = graph(vec![
            rule("a", vec![], ActionPath::next_rules(["ghost", "b"])),
            rule("b", vec![], ActionPath::end()),
        ]);

        let (outcome, log) = run(&graph, &json!({}));
        assert!(outcome.status.is_pass());
        assert_eq!(outcome.missing_rules, 1);
        assert!(log.lines().contains(&"WARNING: Missing rule: ghost".to_string()));
        assert_eq!(log.lines().last().unwrap(), "PASS: b");
    }

    #[test]
    fn test_terminal_reference_is_recorded() {
        let graph = graph(vec![rule("a", vec![], ActionPath::next_rules(["eligible"]))]);

        let (outcome, log) = run(&graph, &json!({}));
        assert_eq!(outcome.reached_terminal.as_deref(), Some("eligible"));
        assert_eq!(outcome.missing_rules, 0);
        assert!(log.lines().contains(&"Reached terminal: eligible (ELIGIBLE)".to_string()));
    }

    #[test]
    fn test_first_matching_branch_wins() {
        let branches = vec![
            ActionBranch::new("Never", vec![Condition::new("kind", Operator::Eq, "none")], "rs"),
            ActionBranch::new("Salaried", vec![Condition::new("kind", Operator::Eq, "SALARIED")], "salaried"),
            ActionBranch::new("Fallback", vec![], "fallback"),
        ];
        let graph = PolicyGraph::new(
            "p",
            "Branches",
            vec![Chain::new(
                "c",
                "Chain",
                vec![
                    RuleSet::new("rs", "Start", vec![rule("start", vec![], ActionPath::branches(branches))]),
                    RuleSet::new("salaried", "Salaried", vec![rule("salary_check", vec![], ActionPath::end())]),
                    RuleSet::new("fallback", "Fallback", vec![rule("fallback_check", vec![], ActionPath::end())]),
                ],
            )],
            vec![TerminalNode::new("eligible", "ELIGIBLE")],
        )
        .unwrap();

        let (outcome, log) = run(&graph, &json!({"kind": "SALARIED"}));
        assert_eq!(outcome.rules_evaluated, 2);
        assert!(log.lines().contains(&"Branch taken: Salaried".to_string()));
        assert!(log.lines().contains(&"PASS: salary_check".to_string()));
        assert!(!log.lines().iter().any(|line| line.contains("fallback_check")));
    }

    #[test]
    fn test_no_matching_branch_ends_path() {
        let branches = vec![ActionBranch::new(
            "Never",
            vec![Condition::new("kind", Operator::Eq, "none")],
            "rs",
        )];
        let graph = graph(vec![rule("start", vec![], ActionPath::branches(branches))]);

        let (outcome, log) = run(&graph, &json!({"kind": "SALARIED"}));
        assert!(outcome.status.is_pass());
        assert_eq!(outcome.rules_evaluated, 1);
        assert!(!log.lines().iter().any(|line| line.starts_with("Branch taken")));
    }

    #[test]
    fn test_unresolved_ruleset_never_aliases_rule_or_terminal() {
        let branches = vec![ActionBranch::new("Anything", vec![], "eligible")];
        let graph = graph(vec![
            rule("start", vec![], ActionPath::branches(branches)),
            rule("next", vec![], ActionPath::next_ruleset("shadow")),
            rule("shadow", vec![Condition::new("x", Operator::Eq, 1)], ActionPath::end()),
        ]);

        let (outcome, log) = run(&graph, &json!({"x": 2}));
        assert!(outcome.status.is_pass());
        assert_eq!(outcome.reached_terminal, None);
        assert_eq!(outcome.missing_rules, 1);
        assert_eq!(outcome.rules_evaluated, 1);
        assert!(log.lines().contains(&"WARNING: Missing rule: eligible".to_string()));
        assert!(!log.lines().iter().any(|line| line.starts_with("Reached terminal")));
    }

    #[test]
    fn test_unresolved_ruleset_does_not_run_same_named_rule() {
        let graph = graph(vec![
            rule("start", vec![], ActionPath::next_ruleset("shadow")),
            rule("shadow", vec![Condition::new("x", Operator::Eq, 1)], ActionPath::end()),
        ]);

        let (outcome, log) = run(&graph, &json!({"x": 2}));
        assert!(outcome.status.is_pass());
        assert_eq!(outcome.rules_evaluated, 1);
        assert_eq!(outcome.missing_rules, 1);
        assert!(log.lines().contains(&"WARNING: Missing rule: shadow".to_string()));
        assert!(!log.lines().iter().any(|line| line.contains("rule: shadow")));
    }

    #[test]
    fn test_unknown_operator_propagates() {
        let bad = Condition {
            field: "x".to_string(),
            operator: "approx".to_string(),
            value: json!(1),
        };
        let graph = graph(vec![rule("a", vec![bad], ActionPath::end())]);

        let mut log = ExecutionLog::new();
        let result = ChainExecutor::new(&graph).execute(&graph.chains()[0], &json!({}), &mut log);
        assert!(result.is_err());
        assert_eq!(log.lines(), ["Evaluating rule: a - "]);
    }
}
