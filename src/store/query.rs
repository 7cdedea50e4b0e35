//! Namespace matching and filter evaluation.
//!
//! Pure functions over the in-memory index. Filters are compiled once per
//! search with [`Filter::compile`], so a bad operator fails the batch up front
//! instead of depending on which records happen to be scanned.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::store::index::Index;
use crate::store::types::{
    Item, ListNamespacesOp, MatchCondition, Namespace, NamespaceMatchType, WILDCARD,
};

// ── Namespace matching ────────────────────────────────────────────────────────

fn segment_matches(pattern: &str, segment: &str) -> bool {
    pattern == WILDCARD || pattern == segment
}

/// Whether `namespace` satisfies a single prefix/suffix condition.
pub fn matches_condition(namespace: &[String], condition: &MatchCondition) -> bool {
    let path = &condition.path;
    if path.len() > namespace.len() {
        return false;
    }
    match condition.match_type {
        NamespaceMatchType::Prefix => path
            .iter()
            .zip(namespace.iter())
            .all(|(p, s)| segment_matches(p, s)),
        NamespaceMatchType::Suffix => path
            .iter()
            .rev()
            .zip(namespace.iter().rev())
            .all(|(p, s)| segment_matches(p, s)),
    }
}

/// Whether `namespace` starts with `prefix`, segment by segment. No wildcards.
pub fn has_prefix(namespace: &[String], prefix: &[String]) -> bool {
    namespace.len() >= prefix.len() && namespace.iter().zip(prefix).all(|(a, b)| a == b)
}

/// Resolve a `ListNamespaces` op: AND all conditions, truncate to `max_depth`,
/// dedup, sort, paginate.
pub fn list_namespaces<'a>(
    namespaces: impl Iterator<Item = &'a Namespace>,
    op: &ListNamespacesOp,
) -> Vec<Namespace> {
    let distinct: BTreeSet<Namespace> = namespaces
        .filter(|ns| op.match_conditions.iter().all(|c| matches_condition(ns, c)))
        .map(|ns| match op.max_depth {
            Some(depth) if ns.len() > depth => ns[..depth].to_vec(),
            _ => ns.clone(),
        })
        .collect();

    distinct.into_iter().skip(op.offset).take(op.limit).collect()
}

// ── Filters ───────────────────────────────────────────────────────────────────

/// A single `$op: operand` clause.
#[derive(Debug, Clone, PartialEq)]
enum Comparison {
    Eq(Value),
    Ne(Value),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
}

impl Comparison {
    fn parse(operator: &str, operand: &Value, path: &str) -> Result<Self> {
        let numeric = || {
            as_number(operand).ok_or_else(|| {
                StoreError::Validation(format!(
                    "operator {operator} at '{path}' requires a numeric operand, got {operand}"
                ))
            })
        };
        match operator {
            "$eq" => Ok(Self::Eq(operand.clone())),
            "$ne" => Ok(Self::Ne(operand.clone())),
            "$gt" => Ok(Self::Gt(numeric()?)),
            "$gte" => Ok(Self::Gte(numeric()?)),
            "$lt" => Ok(Self::Lt(numeric()?)),
            "$lte" => Ok(Self::Lte(numeric()?)),
            other => Err(StoreError::Validation(format!(
                "unsupported operator {other} at '{path}' (supported: $eq, $ne, $gt, $gte, $lt, $lte)"
            ))),
        }
    }

    fn eval(&self, target: &Value) -> bool {
        let cmp = |bound: f64, pass: fn(f64, f64) -> bool| {
            as_number(target).is_some_and(|t| pass(t, bound))
        };
        match self {
            Self::Eq(v) => values_equal(target, v),
            Self::Ne(v) => !values_equal(target, v),
            Self::Gt(b) => cmp(*b, |t, b| t > b),
            Self::Gte(b) => cmp(*b, |t, b| t >= b),
            Self::Lt(b) => cmp(*b, |t, b| t < b),
            Self::Lte(b) => cmp(*b, |t, b| t <= b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Matcher {
    /// An object with `$`-prefixed keys.
    Operators(Vec<Comparison>),
    /// A plain object: target must be an object matching each key.
    Object(Vec<(String, Matcher)>),
    /// Target must be an array of equal length, matched element-wise.
    Array(Vec<Matcher>),
    Equals(Value),
}

impl Matcher {
    fn compile(value: &Value, path: &str) -> Result<Self> {
        match value {
            Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
                let clauses = map
                    .iter()
                    .map(|(op, operand)| Comparison::parse(op, operand, path))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Operators(clauses))
            }
            Value::Object(map) => {
                let fields = map
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Self::compile(v, &format!("{path}.{k}"))?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Object(fields))
            }
            Value::Array(items) => {
                let elements = items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Self::compile(v, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Array(elements))
            }
            scalar => Ok(Self::Equals(scalar.clone())),
        }
    }

    /// A missing target behaves as `null`.
    fn matches(&self, target: Option<&Value>) -> bool {
        let target = target.unwrap_or(&Value::Null);
        match self {
            Self::Operators(clauses) => clauses.iter().all(|c| c.eval(target)),
            Self::Object(fields) => match target {
                Value::Object(obj) => fields.iter().all(|(k, m)| m.matches(obj.get(k))),
                _ => false,
            },
            Self::Array(elements) => match target {
                Value::Array(items) if items.len() == elements.len() => elements
                    .iter()
                    .zip(items)
                    .all(|(m, item)| m.matches(Some(item))),
                _ => false,
            },
            Self::Equals(expected) => values_equal(target, expected),
        }
    }
}

/// A compiled search filter. Every top-level key must match (AND).
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    fields: Vec<(String, Matcher)>,
}

impl Filter {
    pub fn compile(filter: &Map<String, Value>) -> Result<Self> {
        let fields = filter
            .iter()
            .map(|(k, v)| Ok((k.clone(), Matcher::compile(v, k)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fields })
    }

    pub fn matches(&self, value: &Map<String, Value>) -> bool {
        self.fields.iter().all(|(k, m)| m.matches(value.get(k)))
    }
}

/// Numbers, and strings that parse as numbers, compare as `f64`.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Structural equality where `1` and `1.0` are equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

// ── Candidate selection ───────────────────────────────────────────────────────

/// Items under `prefix` that pass `filter`, in index order.
pub fn select_candidates<'a>(
    index: &'a Index,
    prefix: &[String],
    filter: Option<&Filter>,
) -> Vec<&'a Item> {
    index
        .iter_prefix(prefix)
        .filter(|item| filter.is_none_or(|f| f.matches(&item.value)))
        .collect()
}
