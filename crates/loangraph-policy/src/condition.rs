//! Condition definitions and evaluation
//!
//! A condition compares the value found at a dotted path in the applicant
//! record against a literal from the policy. Missing data is a value, not
//! an error: any absent or null segment resolves to `null`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use loangraph_core::{Error, ExecutionLog, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

static NULL: Value = Value::Null;

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
}

impl Operator {
    /// Every supported operator
    pub const ALL: [Operator; 8] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Ge,
        Self::Lt,
        Self::Le,
        Self::In,
        Self::NotIn,
    ];

    /// Token used for this operator in policy text
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }

    /// Apply this operator to a resolved left operand and a configured right operand
    pub fn compare(self, left: &Value, right: &Value) -> Comparison {
        match self {
            Self::Eq => Comparison::Holds(values_equal(left, right)),
            Self::Ne => Comparison::Holds(!values_equal(left, right)),
            Self::Gt => ordered(left, right, Ordering::is_gt),
            Self::Ge => ordered(left, right, Ordering::is_ge),
            Self::Lt => ordered(left, right, Ordering::is_lt),
            Self::Le => ordered(left, right, Ordering::is_le),
            Self::In => contains(right, left),
            Self::NotIn => match contains(right, left) {
                Comparison::Holds(found) => Comparison::Holds(!found),
                incompatible => incompatible,
            },
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of applying an operator to two operands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// Operands were comparable; the flag is the outcome
    Holds(bool),
    /// Operand types cannot be compared with this operator
    Incompatible(String),
}

/// A single comparison within a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the applicant record, e.g. `applicant.age`
    pub field: String,

    /// Operator token; parsed when the condition is evaluated
    pub operator: String,

    /// Literal right-hand operand (scalar or sequence)
    #[serde(deserialize_with = "scalar_or_sequence")]
    pub value: Value,
}

impl Condition {
    /// Create a condition with a known operator
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.as_str().to_string(),
            value: value.into(),
        }
    }

    /// Parse the operator token into a closed operator kind
    pub fn operator(&self) -> Result<Operator> {
        self.operator
            .parse()
            .map_err(|token: String| Error::unknown_operator(token, &self.field))
    }

    /// Evaluate this condition against an applicant record
    ///
    /// Incompatible operands make the condition fail and are noted in the log.
    pub fn evaluate(&self, applicant: &Value, log: &mut ExecutionLog) -> Result<bool> {
        let operator = self.operator()?;
        let left = resolve(&self.field, applicant).unwrap_or(&NULL);

        match operator.compare(left, &self.value) {
            Comparison::Holds(outcome) => Ok(outcome),
            Comparison::Incompatible(detail) => {
                log.incompatible_comparison(&self.field, &detail);
                Ok(false)
            }
        }
    }
}

/// Evaluate a condition list with AND semantics, stopping at the first failure
///
/// An empty list passes.
pub fn all_pass(conditions: &[Condition], applicant: &Value, log: &mut ExecutionLog) -> Result<bool> {
    for condition in conditions {
        if !condition.evaluate(applicant, log)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolve a dotted field path against an applicant record
///
/// Returns `None` as soon as a segment is absent, the current value is not
/// a mapping, or the final value is null.
pub fn resolve<'a>(path: &str, applicant: &'a Value) -> Option<&'a Value> {
    let mut current = applicant;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l == r,
            _ => l == r,
        },
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(l, r)| values_equal(l, r))
        }
        _ => left == right,
    }
}

fn ordered(left: &Value, right: &Value, accept: fn(Ordering) -> bool) -> Comparison {
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => None,
        },
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    };

    match ordering {
        Some(ordering) => Comparison::Holds(accept(ordering)),
        None => Comparison::Incompatible(format!(
            "cannot order {} against {}",
            kind(left),
            kind(right)
        )),
    }
}

fn contains(haystack: &Value, needle: &Value) -> Comparison {
    match (haystack, needle) {
        (Value::Array(items), _) => {
            Comparison::Holds(items.iter().any(|item| values_equal(item, needle)))
        }
        (Value::String(text), Value::String(fragment)) => {
            Comparison::Holds(text.contains(fragment.as_str()))
        }
        _ => Comparison::Incompatible(format!(
            "membership of {} requires a sequence, got {}",
            kind(needle),
            kind(haystack)
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

fn scalar_or_sequence<'de, D>(deserializer: D) -> std::result::Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null | Value::Object(_) => Err(serde::de::Error::custom(format!(
            "condition value must be a scalar or a sequence, got {}",
            kind(&value)
        ))),
        value => Ok(value),
    }
}
