//! Condition expressions over a flattened scenario context.
//!
//! Rule conditions are authored in a small json-logic-like shape:
//!
//! ```json
//! {"and": [{">": [{"var": "deal.termMonths"}, 0]},
//!          {"in": [{"var": "registration.plateScenario"}, ["new_plate", "temp_tag"]]}]}
//! ```
//!
//! and parsed once into the [`Condition`] tree. Evaluation is a total,
//! structurally recursive function: a missing field resolves to
//! "undefined", and any comparison against undefined is `false`. A
//! partial context therefore fails closed (the fee does not apply)
//! instead of aborting the quote.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while parsing a condition expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Unknown condition operator: {0}")]
    UnknownOperator(String),

    #[error("Operator '{op}' expects {expected} operand(s), got {found}")]
    Arity {
        op: String,
        expected: &'static str,
        found: usize,
    },

    #[error("Condition node must have exactly one operator key, found {0}")]
    MalformedNode(usize),

    #[error("Invalid field reference: {0}")]
    InvalidVar(String),

    #[error("Invalid numeric literal: {0}")]
    InvalidNumber(String),

    #[error("Arrays are only allowed as the right-hand side of 'in'")]
    UnexpectedArray,
}

/// A resolved scalar value: a context field or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Decimal),
    Text(String),
}

impl Scalar {
    /// json-logic style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Null => false,
            Scalar::Bool(b) => *b,
            Scalar::Number(n) => !n.is_zero(),
            Scalar::Text(s) => !s.is_empty(),
        }
    }

    fn loose_eq(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Number(a), Scalar::Number(b)) => a == b,
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            _ => false,
        }
    }

    fn ordering(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Number(a), Scalar::Number(b)) => Some(a.cmp(b)),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Number(n) => serde_json::Number::from_str(&n.normalize().to_string())
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(n.to_string())),
            Scalar::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n.normalize()),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<Decimal> for Scalar {
    fn from(value: Decimal) -> Self {
        Scalar::Number(value)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Number(Decimal::from(value))
    }
}

impl From<usize> for Scalar {
    fn from(value: usize) -> Self {
        Scalar::Number(Decimal::from(value))
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(Decimal::from(value))
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// Source of dot-addressable field values.
pub trait Fields {
    /// Look up a field by path (e.g. `tradeIns.length`).
    fn field(&self, path: &str) -> Option<&Scalar>;
}

impl Fields for BTreeMap<String, Scalar> {
    fn field(&self, path: &str) -> Option<&Scalar> {
        self.get(path)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            ">=" => Some(CompareOp::Ge),
            "<=" => Some(CompareOp::Le),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }

    fn apply(&self, left: &Scalar, right: &Scalar) -> bool {
        match self {
            CompareOp::Eq => left.loose_eq(right),
            CompareOp::Ne => !left.loose_eq(right),
            CompareOp::Gt => left.ordering(right) == Some(Ordering::Greater),
            CompareOp::Lt => left.ordering(right) == Some(Ordering::Less),
            CompareOp::Ge => matches!(
                left.ordering(right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CompareOp::Le => matches!(
                left.ordering(right),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// Right-hand side of an `in` test.
#[derive(Debug, Clone, PartialEq)]
pub enum Haystack {
    /// Membership in a list of operands.
    List(Vec<Condition>),
    /// Substring of a text operand.
    Text(Box<Condition>),
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Condition {
    Literal(Scalar),
    Var(String),
    Compare {
        op: CompareOp,
        left: Box<Condition>,
        right: Box<Condition>,
    },
    In {
        needle: Box<Condition>,
        haystack: Haystack,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Field reference.
    pub fn var(path: impl Into<String>) -> Self {
        Condition::Var(path.into())
    }

    /// Literal operand.
    pub fn literal(value: impl Into<Scalar>) -> Self {
        Condition::Literal(value.into())
    }

    /// Binary comparison.
    pub fn compare(op: CompareOp, left: Condition, right: Condition) -> Self {
        Condition::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Parse a condition from its JSON representation.
    pub fn parse(value: &Value) -> Result<Self, ConditionError> {
        match value {
            Value::Null => Ok(Condition::Literal(Scalar::Null)),
            Value::Bool(b) => Ok(Condition::Literal(Scalar::Bool(*b))),
            Value::Number(n) => Ok(Condition::Literal(Scalar::Number(parse_number(n)?))),
            Value::String(s) => Ok(Condition::Literal(Scalar::Text(s.clone()))),
            Value::Array(_) => Err(ConditionError::UnexpectedArray),
            Value::Object(map) => Self::parse_node(map),
        }
    }

    fn parse_node(map: &Map<String, Value>) -> Result<Self, ConditionError> {
        let mut entries = map.iter();
        let (op, args) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(ConditionError::MalformedNode(map.len())),
        };

        if let Some(compare) = CompareOp::from_symbol(op) {
            let [left, right] = binary_operands(op, args)?;
            return Ok(Condition::Compare {
                op: compare,
                left: Box::new(Self::parse(left)?),
                right: Box::new(Self::parse(right)?),
            });
        }

        match op.as_str() {
            "var" => parse_var(args),
            "in" => {
                let [needle, haystack] = binary_operands(op, args)?;
                let haystack = match haystack {
                    Value::Array(items) => Haystack::List(
                        items.iter().map(Self::parse).collect::<Result<_, _>>()?,
                    ),
                    other => Haystack::Text(Box::new(Self::parse(other)?)),
                };
                Ok(Condition::In {
                    needle: Box::new(Self::parse(needle)?),
                    haystack,
                })
            }
            "and" | "or" => {
                let operands = match args {
                    Value::Array(items) if !items.is_empty() => items
                        .iter()
                        .map(Self::parse)
                        .collect::<Result<Vec<_>, _>>()?,
                    Value::Array(_) => {
                        return Err(ConditionError::Arity {
                            op: op.clone(),
                            expected: "at least 1",
                            found: 0,
                        })
                    }
                    other => vec![Self::parse(other)?],
                };
                Ok(if op == "and" {
                    Condition::And(operands)
                } else {
                    Condition::Or(operands)
                })
            }
            "not" | "!" => {
                let operand = match args {
                    Value::Array(items) if items.len() == 1 => &items[0],
                    Value::Array(items) => {
                        return Err(ConditionError::Arity {
                            op: op.clone(),
                            expected: "1",
                            found: items.len(),
                        })
                    }
                    other => other,
                };
                Ok(Condition::Not(Box::new(Self::parse(operand)?)))
            }
            other => Err(ConditionError::UnknownOperator(other.to_string())),
        }
    }

    /// Evaluate the condition against a set of fields.
    pub fn evaluate(&self, fields: &impl Fields) -> bool {
        self.resolve(fields).is_some_and(|value| value.is_truthy())
    }

    /// Resolve to a scalar; `None` means undefined.
    fn resolve(&self, fields: &impl Fields) -> Option<Scalar> {
        match self {
            Condition::Literal(value) => Some(value.clone()),
            Condition::Var(path) => fields.field(path).cloned(),
            Condition::Compare { op, left, right } => {
                let matched = match (left.resolve(fields), right.resolve(fields)) {
                    (Some(l), Some(r)) => op.apply(&l, &r),
                    _ => false,
                };
                Some(Scalar::Bool(matched))
            }
            Condition::In { needle, haystack } => {
                let matched = match needle.resolve(fields) {
                    Some(needle) => haystack.contains(&needle, fields),
                    None => false,
                };
                Some(Scalar::Bool(matched))
            }
            Condition::And(items) => Some(Scalar::Bool(items.iter().all(|c| c.evaluate(fields)))),
            Condition::Or(items) => Some(Scalar::Bool(items.iter().any(|c| c.evaluate(fields)))),
            Condition::Not(inner) => Some(Scalar::Bool(!inner.evaluate(fields))),
        }
    }

    /// Every field path referenced by this condition.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_fields(&mut paths);
        paths.sort_unstable();
        paths.dedup();
        paths
    }

    fn collect_fields<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            Condition::Literal(_) => {}
            Condition::Var(path) => paths.push(path),
            Condition::Compare { left, right, .. } => {
                left.collect_fields(paths);
                right.collect_fields(paths);
            }
            Condition::In { needle, haystack } => {
                needle.collect_fields(paths);
                match haystack {
                    Haystack::List(items) => items.iter().for_each(|c| c.collect_fields(paths)),
                    Haystack::Text(text) => text.collect_fields(paths),
                }
            }
            Condition::And(items) | Condition::Or(items) => {
                items.iter().for_each(|c| c.collect_fields(paths))
            }
            Condition::Not(inner) => inner.collect_fields(paths),
        }
    }

    /// Convert back to the JSON representation.
    pub fn to_value(&self) -> Value {
        fn node(op: &str, args: Value) -> Value {
            let mut map = Map::new();
            map.insert(op.to_string(), args);
            Value::Object(map)
        }

        match self {
            Condition::Literal(value) => value.to_value(),
            Condition::Var(path) => node("var", Value::String(path.clone())),
            Condition::Compare { op, left, right } => node(
                op.symbol(),
                Value::Array(vec![left.to_value(), right.to_value()]),
            ),
            Condition::In { needle, haystack } => {
                let rhs = match haystack {
                    Haystack::List(items) => {
                        Value::Array(items.iter().map(Condition::to_value).collect())
                    }
                    Haystack::Text(text) => text.to_value(),
                };
                node("in", Value::Array(vec![needle.to_value(), rhs]))
            }
            Condition::And(items) => node(
                "and",
                Value::Array(items.iter().map(Condition::to_value).collect()),
            ),
            Condition::Or(items) => node(
                "or",
                Value::Array(items.iter().map(Condition::to_value).collect()),
            ),
            Condition::Not(inner) => node("not", inner.to_value()),
        }
    }
}

impl Haystack {
    fn contains(&self, needle: &Scalar, fields: &impl Fields) -> bool {
        match self {
            Haystack::List(items) => items
                .iter()
                .filter_map(|item| item.resolve(fields))
                .any(|item| needle.loose_eq(&item)),
            Haystack::Text(text) => match (needle, text.resolve(fields)) {
                (Scalar::Text(n), Some(Scalar::Text(t))) => t.contains(n.as_str()),
                _ => false,
            },
        }
    }
}

impl TryFrom<Value> for Condition {
    type Error = ConditionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Condition::parse(&value)
    }
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        condition.to_value()
    }
}

fn binary_operands<'a>(op: &str, args: &'a Value) -> Result<[&'a Value; 2], ConditionError> {
    match args {
        Value::Array(items) if items.len() == 2 => Ok([&items[0], &items[1]]),
        Value::Array(items) => Err(ConditionError::Arity {
            op: op.to_string(),
            expected: "2",
            found: items.len(),
        }),
        _ => Err(ConditionError::Arity {
            op: op.to_string(),
            expected: "2",
            found: 1,
        }),
    }
}

fn parse_var(args: &Value) -> Result<Condition, ConditionError> {
    let path = match args {
        Value::String(path) => path,
        Value::Array(items) if items.len() == 1 => match &items[0] {
            Value::String(path) => path,
            other => return Err(ConditionError::InvalidVar(other.to_string())),
        },
        other => return Err(ConditionError::InvalidVar(other.to_string())),
    };

    let path = path.trim();
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(ConditionError::InvalidVar(path.to_string()));
    }
    Ok(Condition::Var(path.to_string()))
}

fn parse_number(number: &serde_json::Number) -> Result<Decimal, ConditionError> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ConditionError::InvalidNumber(text))
}
