//! Generic boolean rule matcher. One engine, three consumers: agent/tag
//! matching in the dispatcher, auto-tag evaluation on assets, and web
//! fingerprint conditions — never re-implemented per consumer.

use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::MatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Gt,
    Ge,
    Lt,
    Le,
    ListContains,
    Cidr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaf {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
    #[serde(default)]
    pub ignore_case: bool,
}

/// A rule is a leaf predicate or a boolean composite over other rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rule {
    Leaf(Leaf),
    And { and: Vec<Rule> },
    Or { or: Vec<Rule> },
    Not { not: Box<Rule> },
}

impl Rule {
    pub fn evaluate(&self, doc: &Value) -> Result<bool, MatchError> {
        match self {
            Self::Leaf(leaf) => evaluate_leaf(leaf, doc),
            Self::And { and } => {
                for rule in and {
                    if !rule.evaluate(doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or { or } => {
                for rule in or {
                    if rule.evaluate(doc)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not { not } => Ok(!not.evaluate(doc)?),
        }
    }
}

/// Resolves a dotted path (`headers.Server`, `ports.0`) against a JSON
/// document, with one level of numeric list indexing.
fn resolve_field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let idx: usize = segment.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn as_lower(value: &Value, ignore_case: bool) -> String {
    let s = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if ignore_case { s.to_lowercase() } else { s }
}

fn evaluate_leaf(leaf: &Leaf, doc: &Value) -> Result<bool, MatchError> {
    let field_value = resolve_field(doc, &leaf.field);

    match leaf.operator {
        Operator::Equals | Operator::NotEquals => {
            let Some(fv) = field_value else {
                return Ok(leaf.operator == Operator::NotEquals);
            };
            let eq = if leaf.ignore_case {
                as_lower(fv, true) == as_lower(&leaf.value, true)
            } else {
                fv == &leaf.value
            };
            Ok(if leaf.operator == Operator::Equals { eq } else { !eq })
        }
        Operator::In => {
            let Some(fv) = field_value else { return Ok(false) };
            let Value::Array(candidates) = &leaf.value else {
                return Err(MatchError::FieldNotFound(leaf.field.clone()));
            };
            Ok(candidates.iter().any(|c| {
                if leaf.ignore_case {
                    as_lower(c, true) == as_lower(fv, true)
                } else {
                    c == fv
                }
            }))
        }
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
            let Some(fv) = field_value else { return Ok(false) };
            let hay = as_lower(fv, leaf.ignore_case);
            let needle = as_lower(&leaf.value, leaf.ignore_case);
            Ok(match leaf.operator {
                Operator::Contains => hay.contains(&needle),
                Operator::StartsWith => hay.starts_with(&needle),
                Operator::EndsWith => hay.ends_with(&needle),
                _ => unreachable!(),
            })
        }
        Operator::Regex => {
            let Some(fv) = field_value else { return Ok(false) };
            let pattern = leaf
                .value
                .as_str()
                .ok_or_else(|| MatchError::InvalidRegex(leaf.value.to_string()))?;
            let re = Regex::new(pattern).map_err(|e| MatchError::InvalidRegex(e.to_string()))?;
            Ok(re.is_match(&as_lower(fv, false)))
        }
        Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le => {
            let Some(fv) = field_value.and_then(Value::as_f64) else { return Ok(false) };
            let target = leaf
                .value
                .as_f64()
                .ok_or_else(|| MatchError::FieldNotFound(leaf.field.clone()))?;
            Ok(match leaf.operator {
                Operator::Gt => fv > target,
                Operator::Ge => fv >= target,
                Operator::Lt => fv < target,
                Operator::Le => fv <= target,
                _ => unreachable!(),
            })
        }
        Operator::ListContains => {
            let Some(Value::Array(items)) = field_value else { return Ok(false) };
            Ok(items.iter().any(|item| {
                if leaf.ignore_case {
                    as_lower(item, true) == as_lower(&leaf.value, true)
                } else {
                    item == &leaf.value
                }
            }))
        }
        Operator::Cidr => {
            let Some(fv) = field_value.and_then(Value::as_str) else { return Ok(false) };
            let ip = IpAddr::from_str(fv).map_err(|_| MatchError::InvalidCidr(fv.to_string()))?;
            let cidr_str = leaf
                .value
                .as_str()
                .ok_or_else(|| MatchError::InvalidCidr(leaf.value.to_string()))?;
            let net = IpNetwork::from_str(cidr_str).map_err(|_| MatchError::InvalidCidr(cidr_str.to_string()))?;
            Ok(net.contains(ip))
        }
    }
}
