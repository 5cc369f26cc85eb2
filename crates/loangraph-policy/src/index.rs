//! Id lookup over a policy graph
//!
//! Built once when the graph is validated and shared read-only afterwards.
//! A failed lookup is a traversal event, not an error.

use std::collections::HashMap;

use crate::rule::{Chain, Rule, TerminalNode};

/// Position of a rule inside the graph's chain/ruleset/rule nesting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleLocation {
    pub chain: usize,
    pub ruleset: usize,
    pub rule: usize,
}

/// Lookup tables for rules, ruleset entry points, and terminal nodes
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    rules: HashMap<String, RuleLocation>,
    ruleset_entries: HashMap<String, String>,
    terminals: HashMap<String, usize>,
}

impl RuleIndex {
    /// Scan every chain, ruleset, and rule
    ///
    /// Fails on a rule id that appears twice anywhere in the graph. When a
    /// ruleset id repeats, the first ruleset keeps the entry point.
    pub fn build(chains: &[Chain], terminals: &[TerminalNode]) -> Result<Self, String> {
        let mut index = Self::default();

        for (chain_pos, chain) in chains.iter().enumerate() {
            for (ruleset_pos, ruleset) in chain.rulesets.iter().enumerate() {
                if let Some(first) = ruleset.rules.first() {
                    index
                        .ruleset_entries
                        .entry(ruleset.id.clone())
                        .or_insert_with(|| first.id.clone());
                }

                for (rule_pos, rule) in ruleset.rules.iter().enumerate() {
                    let location = RuleLocation {
                        chain: chain_pos,
                        ruleset: ruleset_pos,
                        rule: rule_pos,
                    };
                    if index.rules.insert(rule.id.clone(), location).is_some() {
                        return Err(format!("duplicate rule id '{}'", rule.id));
                    }
                }
            }
        }

        for (pos, terminal) in terminals.iter().enumerate() {
            index.terminals.entry(terminal.id.clone()).or_insert(pos);
        }

        Ok(index)
    }

    /// Location of a rule by id
    pub fn locate(&self, rule_id: &str) -> Option<RuleLocation> {
        self.rules.get(rule_id).copied()
    }

    /// Resolve a rule id against the chains this index was built from
    pub fn resolve<'g>(&self, chains: &'g [Chain], rule_id: &str) -> Option<&'g Rule> {
        let location = self.locate(rule_id)?;
        chains
            .get(location.chain)?
            .rulesets
            .get(location.ruleset)?
            .rules
            .get(location.rule)
    }

    /// First rule id of a ruleset
    pub fn ruleset_entry(&self, ruleset_id: &str) -> Option<&str> {
        self.ruleset_entries.get(ruleset_id).map(String::as_str)
    }

    /// Position of a terminal node by id
    pub fn terminal_position(&self, terminal_id: &str) -> Option<usize> {
        self.terminals.get(terminal_id).copied()
    }

    pub fn contains_rule(&self, rule_id: &str) -> bool {
        self.rules.contains_key(rule_id)
    }

    /// Number of indexed rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
