//! Rewrite outcomes: attribute renames and value transforms
//!
//! Renames emit a `Set` for the new name and a `Remove` for the old one.
//! Value rewrites only ever emit `Set`. [`RewriteOutcome::apply`] performs
//! every `Set` before any `Remove`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::{EvalContext, OutcomeBuilder};
use crate::{Error, Result};

/// Raw outcome of a rewrite rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RewriteAction {
    /// Rename attribute `from` to `to`
    RenameExact { from: String, to: String },
    /// Rename every attribute whose name matches `pattern` to `to`
    RenameRegex { pattern: String, to: String },
    /// Rename `from` to the `index`-th part of `from` split on `delimiter`
    RenameSplit {
        from: String,
        delimiter: String,
        index: usize,
    },
    /// Set `attribute` to a fixed value
    ValueString { attribute: String, value: String },
    /// Replace matches of `pattern` in the value of `attribute`
    ValueRegex {
        attribute: String,
        pattern: String,
        replacement: String,
    },
    /// Keep the `index`-th part of the value of `attribute` split on `delimiter`
    ValueSplit {
        attribute: String,
        delimiter: String,
        index: usize,
    },
}

/// A single change to an attribute map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AttributeChange {
    Set { name: String, value: String },
    Remove { name: String },
}

/// Accumulated rewrite result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub changes: Vec<AttributeChange>,
}

impl RewriteOutcome {
    /// Apply all sets, then all removes
    pub fn apply(&self, attributes: &mut BTreeMap<String, String>) {
        for change in &self.changes {
            if let AttributeChange::Set { name, value } = change {
                attributes.insert(name.clone(), value.clone());
            }
        }
        for change in &self.changes {
            if let AttributeChange::Remove { name } = change {
                attributes.remove(name);
            }
        }
    }
}

/// Builder for [`RewriteAction`] rules
///
/// Rewrites read from `attributes`, the output of the filter stage, rather
/// than from the record itself.
#[derive(Debug)]
pub struct RewriteBuilder<'a> {
    attributes: &'a BTreeMap<String, String>,
}

impl<'a> RewriteBuilder<'a> {
    pub fn new(attributes: &'a BTreeMap<String, String>) -> Self {
        Self { attributes }
    }

    fn rename(acc: &mut RewriteOutcome, old: &str, new: &str, value: &str) {
        if new.is_empty() || new == old {
            return;
        }
        acc.changes.push(AttributeChange::Set {
            name: new.to_string(),
            value: value.to_string(),
        });
        acc.changes.push(AttributeChange::Remove {
            name: old.to_string(),
        });
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

impl OutcomeBuilder for RewriteBuilder<'_> {
    type Raw = RewriteAction;
    type Output = RewriteOutcome;

    fn merge(
        &mut self,
        _ctx: &EvalContext<'_>,
        outcomes: &[RewriteAction],
        acc: &mut RewriteOutcome,
    ) -> Result<()> {
        for outcome in outcomes {
            match outcome {
                RewriteAction::RenameExact { from, to } => {
                    if let Some(value) = self.attributes.get(from) {
                        Self::rename(acc, from, to, value);
                    }
                }
                RewriteAction::RenameRegex { pattern, to } => {
                    let regex = compile(pattern)?;
                    for (name, value) in self.attributes {
                        if regex.is_match(name) {
                            Self::rename(acc, name, to, value);
                        }
                    }
                }
                RewriteAction::RenameSplit {
                    from,
                    delimiter,
                    index,
                } => {
                    if let Some(value) = self.attributes.get(from)
                        && let Some(part) = from.split(delimiter.as_str()).nth(*index)
                    {
                        Self::rename(acc, from, part, value);
                    }
                }
                RewriteAction::ValueString { attribute, value } => {
                    acc.changes.push(AttributeChange::Set {
                        name: attribute.clone(),
                        value: value.clone(),
                    });
                }
                RewriteAction::ValueRegex {
                    attribute,
                    pattern,
                    replacement,
                } => {
                    let regex = compile(pattern)?;
                    if let Some(value) = self.attributes.get(attribute) {
                        acc.changes.push(AttributeChange::Set {
                            name: attribute.clone(),
                            value: regex.replace_all(value, replacement.as_str()).into_owned(),
                        });
                    }
                }
                RewriteAction::ValueSplit {
                    attribute,
                    delimiter,
                    index,
                } => {
                    if let Some(value) = self.attributes.get(attribute)
                        && let Some(part) = value.split(delimiter.as_str()).nth(*index)
                    {
                        acc.changes.push(AttributeChange::Set {
                            name: attribute.clone(),
                            value: part.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
