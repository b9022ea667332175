//! Condition evaluation
//!
//! A condition compares a value against a needle with one of nine operators.
//! String operators are case-insensitive. `regex` is anchored at the start of
//! the value but does not have to consume all of it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::record::Record;

/// Comparison operator for a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    Contains,
    NotContains,
    InList,
    StartsWith,
    EndsWith,
    Regex,
    Bool,
    MatchAll,
}

impl Operator {
    /// Every operator, in declaration order
    pub const ALL: [Operator; 9] = [
        Operator::Equal,
        Operator::Contains,
        Operator::NotContains,
        Operator::InList,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Regex,
        Operator::Bool,
        Operator::MatchAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "equal",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::InList => "in_list",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Regex => "regex",
            Operator::Bool => "bool",
            Operator::MatchAll => "match_all",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition could not be evaluated
#[derive(Debug, thiserror::Error)]
#[error("Condition {operator} failed for value {value:?} with needle {needle:?}: {source}")]
pub struct MatchError {
    pub operator: Operator,
    pub value: String,
    pub needle: String,
    #[source]
    pub source: regex::Error,
}

/// Evaluate `operator` for `value` against `needle`
///
/// `negate` inverts the result, except for `match_all`: with `negate` set it
/// never matches.
pub fn match_value(
    value: &Value,
    needle: &str,
    operator: Operator,
    negate: bool,
) -> Result<bool, MatchError> {
    if operator == Operator::MatchAll {
        return Ok(!negate);
    }

    let text = value_to_string(value);
    let base = match operator {
        Operator::Equal => text.to_lowercase() == needle.to_lowercase(),
        Operator::Contains => text.to_lowercase().contains(&needle.to_lowercase()),
        Operator::NotContains => !text.to_lowercase().contains(&needle.to_lowercase()),
        Operator::StartsWith => text.to_lowercase().starts_with(&needle.to_lowercase()),
        Operator::EndsWith => text.to_lowercase().ends_with(&needle.to_lowercase()),
        Operator::InList => {
            let needle = needle.to_lowercase();
            text.split(',').any(|item| item.trim().to_lowercase() == needle)
        }
        Operator::Regex => {
            let pattern = format!("^(?:{needle})");
            let regex = Regex::new(&pattern).map_err(|source| MatchError {
                operator,
                value: text.clone(),
                needle: needle.to_string(),
                source,
            })?;
            regex.is_match(&text)
        }
        Operator::Bool => truthy(value) == truthy(&Value::String(needle.to_string())),
        Operator::MatchAll => true,
    };

    Ok(base != negate)
}

/// Convenience wrapper over [`match_value`] for plain strings
pub fn match_str(
    value: &str,
    needle: &str,
    operator: Operator,
    negate: bool,
) -> Result<bool, MatchError> {
    match_value(&Value::String(value.to_string()), needle, operator, negate)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "none".to_string(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// One side of a condition: operator, needle and negation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    pub operator: Operator,
    #[serde(default)]
    pub needle: String,
    #[serde(default)]
    pub negate: bool,
}

impl Matcher {
    pub fn new(operator: Operator, needle: impl Into<String>) -> Self {
        Self {
            operator,
            needle: needle.into(),
            negate: false,
        }
    }

    /// Matcher that accepts anything
    pub fn any() -> Self {
        Self::new(Operator::MatchAll, "")
    }

    /// Invert this matcher
    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn matches(&self, value: &str) -> Result<bool, MatchError> {
        match_str(value, &self.needle, self.operator, self.negate)
    }
}

/// A single rule condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Condition {
    /// Match against the record key
    Key(Matcher),
    /// Match when some attribute satisfies both the name and value matcher
    Attribute { name: Matcher, value: Matcher },
}

impl Condition {
    pub fn key(matcher: Matcher) -> Self {
        Self::Key(matcher)
    }

    pub fn attribute(name: Matcher, value: Matcher) -> Self {
        Self::Attribute { name, value }
    }

    /// Shorthand for "attribute `name` equals `value`"
    pub fn attribute_equals(name: &str, value: &str) -> Self {
        Self::Attribute {
            name: Matcher::new(Operator::Equal, name),
            value: Matcher::new(Operator::Equal, value),
        }
    }

    pub fn evaluate(&self, record: &Record) -> Result<bool, MatchError> {
        match self {
            Condition::Key(matcher) => matcher.matches(&record.key),
            Condition::Attribute { name, value } => {
                for (attr_name, attr_value) in record.attributes() {
                    if name.matches(attr_name)? && value.matches(attr_value)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}
