//! Rule action definitions
//!
//! Each rule carries two paths, one taken when its conditions pass and one
//! when they fail. A path moves traversal forward through at most one kind
//! of transition; declaring several kinds on one path is rejected at load.

use serde::Deserialize;

use crate::condition::Condition;

/// The two outcome paths of a rule
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Action {
    /// Path taken when every condition passes
    #[serde(default)]
    pub on_true: ActionPath,

    /// Path taken when any condition fails
    #[serde(default)]
    pub on_false: ActionPath,
}

/// One outcome path of a rule
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawActionPath")]
pub struct ActionPath {
    /// Informational decision label; not used to pick the final decision
    pub decision: Option<String>,

    /// Reason reported when this path rejects the applicant
    pub reason: Option<String>,

    /// Where traversal goes next
    pub transition: Transition,
}

impl ActionPath {
    /// Path that ends traversal of this branch of the graph
    pub fn end() -> Self {
        Self::default()
    }

    /// Path that enqueues the given rule ids
    pub fn next_rules<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transition: Transition::NextRules(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Path that jumps to the entry rule of a ruleset
    pub fn next_ruleset(ruleset_id: impl Into<String>) -> Self {
        Self {
            transition: Transition::NextRuleset(ruleset_id.into()),
            ..Self::default()
        }
    }

    /// Path that picks the first matching branch
    pub fn branches(branches: Vec<ActionBranch>) -> Self {
        Self {
            transition: Transition::Branches(branches),
            ..Self::default()
        }
    }

    /// Attach a rejection reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Successor selection of an action path
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Transition {
    /// No successors
    #[default]
    End,
    /// Enqueue every listed rule id, in order
    NextRules(Vec<String>),
    /// Enqueue the entry rule of the referenced ruleset
    NextRuleset(String),
    /// Take the first branch whose conditions pass
    Branches(Vec<ActionBranch>),
}

/// Conditional jump to the entry rule of another ruleset
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawActionBranch")]
pub struct ActionBranch {
    /// Display name, also used to derive the visualization node id
    pub name: String,

    /// Conditions that select this branch (AND-combined, empty always matches)
    pub conditions: Vec<Condition>,

    /// Target ruleset (or subgraph) id
    pub target: String,
}

impl ActionBranch {
    pub fn new(name: impl Into<String>, conditions: Vec<Condition>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions,
            target: target.into(),
        }
    }

    /// Synthetic node id for this branch, e.g. `branch_high_risk`
    pub fn node_id(&self) -> String {
        format!("branch_{}", self.name.replace(' ', "_").to_lowercase())
    }
}

#[derive(Deserialize)]
struct RawActionPath {
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    next_rules: Option<Vec<String>>,
    #[serde(default)]
    next_ruleset: Option<String>,
    #[serde(default)]
    next_subgraph: Option<String>,
    #[serde(default)]
    branches: Option<Vec<ActionBranch>>,
}

impl TryFrom<RawActionPath> for ActionPath {
    type Error = String;

    fn try_from(raw: RawActionPath) -> Result<Self, Self::Error> {
        let target = single_target(raw.next_ruleset, raw.next_subgraph)?;
        let next_rules = raw.next_rules.filter(|ids| !ids.is_empty());
        let branches = raw.branches.filter(|branches| !branches.is_empty());

        let transition = match (next_rules, target, branches) {
            (None, None, None) => Transition::End,
            (Some(ids), None, None) => Transition::NextRules(ids),
            (None, Some(ruleset), None) => Transition::NextRuleset(ruleset),
            (None, None, Some(branches)) => Transition::Branches(branches),
            _ => {
                return Err(
                    "action path may declare only one of next_rules, next_ruleset/next_subgraph, branches"
                        .to_string(),
                )
            }
        };

        Ok(Self {
            decision: raw.decision,
            reason: raw.reason,
            transition,
        })
    }
}

#[derive(Deserialize)]
struct RawActionBranch {
    name: String,
    #[serde(default)]
    condition: Option<Condition>,
    #[serde(default)]
    conditions: Vec<Condition>,
    #[serde(default)]
    next_ruleset: Option<String>,
    #[serde(default)]
    next_subgraph: Option<String>,
}

impl TryFrom<RawActionBranch> for ActionBranch {
    type Error = String;

    fn try_from(raw: RawActionBranch) -> Result<Self, Self::Error> {
        let target = single_target(raw.next_ruleset, raw.next_subgraph)?
            .ok_or_else(|| format!("branch '{}' has no next_ruleset or next_subgraph", raw.name))?;

        let conditions = raw.condition.into_iter().chain(raw.conditions).collect();

        Ok(Self {
            name: raw.name,
            conditions,
            target,
        })
    }
}

fn single_target(
    next_ruleset: Option<String>,
    next_subgraph: Option<String>,
) -> Result<Option<String>, String> {
    match (next_ruleset, next_subgraph) {
        (Some(ruleset), Some(subgraph)) => Err(format!(
            "both next_ruleset '{}' and next_subgraph '{}' are set",
            ruleset, subgraph
        )),
        (ruleset, subgraph) => Ok(ruleset.or(subgraph)),
    }
}
