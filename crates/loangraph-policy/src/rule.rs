//! Policy graph and rule definitions
//!
//! A policy graph is parsed and validated once, then shared read-only by
//! any number of evaluations.

use std::path::Path;

use loangraph_core::{Error, Result};
use serde::Deserialize;

use crate::action::Action;
use crate::condition::Condition;
use crate::index::RuleIndex;

/// Root of a credit policy: ordered chains plus terminal decisions
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawPolicyGraph")]
pub struct PolicyGraph {
    id: String,
    name: String,
    chains: Vec<Chain>,
    terminal_nodes: Vec<TerminalNode>,
    index: RuleIndex,
}

impl PolicyGraph {
    /// Build a validated graph
    ///
    /// Rejects an empty chain or terminal list, chains without rulesets,
    /// rulesets without rules, and rule ids that repeat anywhere in the graph.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        chains: Vec<Chain>,
        terminal_nodes: Vec<TerminalNode>,
    ) -> Result<Self> {
        Self::validated(id.into(), name.into(), chains, terminal_nodes).map_err(Error::schema)
    }

    fn validated(
        id: String,
        name: String,
        chains: Vec<Chain>,
        terminal_nodes: Vec<TerminalNode>,
    ) -> std::result::Result<Self, String> {
        if terminal_nodes.is_empty() {
            return Err(format!("policy '{}' declares no terminal_nodes", id));
        }
        if chains.is_empty() {
            return Err(format!("policy '{}' declares no chains", id));
        }

        for chain in &chains {
            if chain.rulesets.is_empty() {
                return Err(format!("chain '{}' has no rulesets", chain.id));
            }
            for ruleset in &chain.rulesets {
                if ruleset.rules.is_empty() {
                    return Err(format!(
                        "ruleset '{}' in chain '{}' has no rules",
                        ruleset.id, chain.id
                    ));
                }
            }
        }

        let index = RuleIndex::build(&chains, &terminal_nodes)?;

        Ok(Self {
            id,
            name,
            chains,
            terminal_nodes,
            index,
        })
    }

    /// Parse and validate policy JSON
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::schema(e.to_string()))
    }

    /// Parse and validate policy YAML
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::schema(e.to_string()))
    }

    /// Load a policy file; `.yaml`/`.yml` files are read as YAML, anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chains in execution order
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn terminal_nodes(&self) -> &[TerminalNode] {
        &self.terminal_nodes
    }

    /// Terminal node reported when every chain passes
    pub fn default_terminal(&self) -> &TerminalNode {
        // non-empty by construction
        &self.terminal_nodes[0]
    }

    /// Look up a rule anywhere in the graph
    pub fn rule(&self, rule_id: &str) -> Option<&Rule> {
        self.index.resolve(&self.chains, rule_id)
    }

    /// Look up a terminal node by id
    pub fn terminal(&self, terminal_id: &str) -> Option<&TerminalNode> {
        self.index
            .terminal_position(terminal_id)
            .and_then(|pos| self.terminal_nodes.get(pos))
    }

    /// Entry rule id of a ruleset
    pub fn ruleset_entry(&self, ruleset_id: &str) -> Option<&str> {
        self.index.ruleset_entry(ruleset_id)
    }

    pub fn index(&self) -> &RuleIndex {
        &self.index
    }

    /// Every rule with its enclosing ruleset, in declaration order
    pub fn rules(&self) -> impl Iterator<Item = (&RuleSet, &Rule)> {
        self.chains
            .iter()
            .flat_map(|chain| chain.rulesets.iter())
            .flat_map(|ruleset| ruleset.rules.iter().map(move |rule| (ruleset, rule)))
    }

    /// Total number of rules
    pub fn rule_count(&self) -> usize {
        self.index.len()
    }
}

/// One phase of eligibility checking
#[derive(Debug, Clone, Deserialize)]
pub struct Chain {
    pub id: String,
    pub name: String,
    pub rulesets: Vec<RuleSet>,
}

impl Chain {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rulesets: Vec<RuleSet>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rulesets,
        }
    }

    /// First rule of the first ruleset
    pub fn entry_rule(&self) -> Option<&Rule> {
        self.rulesets.first()?.rules.first()
    }
}

/// Ordered group of related rules; the first rule is the entry point
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSet {
    pub id: String,
    pub name: String,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rules,
        }
    }
}

/// Atomic evaluable unit of a policy
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    /// Identifier, unique across the whole graph
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// AND-combined conditions
    pub conditions: Vec<Condition>,

    pub action: Action,
}

impl Rule {
    pub fn new(id: impl Into<String>, conditions: Vec<Condition>, action: Action) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            conditions,
            action,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name if set, otherwise the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Graph exit carrying a final decision label
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TerminalNode {
    pub id: String,
    pub decision: String,
}

impl TerminalNode {
    pub fn new(id: impl Into<String>, decision: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            decision: decision.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawPolicyGraph {
    id: String,
    name: String,
    chains: Vec<Chain>,
    terminal_nodes: Vec<TerminalNode>,
}

impl TryFrom<RawPolicyGraph> for PolicyGraph {
    type Error = String;

    fn try_from(raw: RawPolicyGraph) -> std::result::Result<Self, Self::Error> {
        Self::validated(raw.id, raw.name, raw.chains, raw.terminal_nodes)
    }
}
