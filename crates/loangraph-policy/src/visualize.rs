//! Node/link export of a policy graph for external renderers

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::action::{ActionPath, Transition};
use crate::rule::{PolicyGraph, Rule};

/// Group assigned to terminal nodes
pub const TERMINAL_GROUP: &str = "Terminal";

/// Group assigned to synthetic branch nodes
pub const BRANCH_GROUP: &str = "Branch";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualNode {
    pub id: String,
    pub name: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualLink {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Renderer-ready graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualGraph {
    pub nodes: Vec<VisualNode>,
    pub links: Vec<VisualLink>,
}

impl VisualGraph {
    pub fn node(&self, id: &str) -> Option<&VisualNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn has_link(&self, source: &str, target: &str) -> bool {
        self.links
            .iter()
            .any(|link| link.source == source && link.target == target)
    }
}

/// Accumulates nodes (first occurrence of an id wins) and links
struct Builder<'g> {
    graph: &'g PolicyGraph,
    seen: HashSet<String>,
    out: VisualGraph,
}

impl<'g> Builder<'g> {
    fn node(&mut self, id: impl Into<String>, name: impl Into<String>, group: impl Into<String>) {
        let id = id.into();
        if self.seen.insert(id.clone()) {
            self.out.nodes.push(VisualNode {
                id,
                name: name.into(),
                group: group.into(),
            });
        }
    }

    fn link(&mut self, source: &str, target: &str, label: &str) {
        self.out.links.push(VisualLink {
            source: source.to_string(),
            target: target.to_string(),
            label: label.to_string(),
        });
    }

    /// Entry rule of a ruleset; an unknown ruleset yields the raw reference,
    /// which renders as a dangling target
    fn resolve(&self, ruleset_id: &'g str) -> &'g str {
        self.graph.ruleset_entry(ruleset_id).unwrap_or(ruleset_id)
    }

    /// Links for one outcome path; branches are drawn only when `follow_branches` is set
    fn path(&mut self, rule: &'g Rule, path: &'g ActionPath, label: &str, follow_branches: bool) {
        match &path.transition {
            Transition::End => {}
            Transition::NextRules(ids) => {
                for id in ids {
                    self.link(&rule.id, id, label);
                }
            }
            Transition::NextRuleset(ruleset_id) => {
                let target = self.resolve(ruleset_id);
                self.link(&rule.id, target, label);
            }
            Transition::Branches(_) if !follow_branches => {}
            Transition::Branches(branches) => {
                for branch in branches {
                    let branch_id = branch.node_id();
                    let target = self.resolve(&branch.target);
                    self.node(&branch_id, format!("Branch: {}", branch.name), BRANCH_GROUP);
                    self.link(&rule.id, &branch_id, &branch.name);
                    self.link(&branch_id, target, "");
                }
            }
        }
    }
}

/// Convert a validated graph into nodes and links
///
/// Terminal nodes come first, then each rule grouped by its ruleset name,
/// with synthetic branch nodes added as their rules are visited. Pass-path
/// links are labelled `pass`, fail-path links `fail`, and branch links carry
/// the branch name. Only pass-path branches are drawn.
pub fn to_visual_graph(graph: &PolicyGraph) -> VisualGraph {
    let mut builder = Builder {
        graph,
        seen: HashSet::new(),
        out: VisualGraph::default(),
    };

    for terminal in graph.terminal_nodes() {
        builder.node(&terminal.id, &terminal.decision, TERMINAL_GROUP);
    }

    for (ruleset, rule) in graph.rules() {
        builder.node(&rule.id, rule.display_name(), &ruleset.name);
        builder.path(rule, &rule.action.on_true, "pass", true);
        // a failing rule ends its chain, so fail-path branches are never taken
        builder.path(rule, &rule.action.on_false, "fail", false);
    }

    builder.out
}
