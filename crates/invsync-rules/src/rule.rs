//! Rule type shared by all outcome kinds
//!
//! A rule combines its conditions with a [`RuleMode`] and carries an ordered
//! list of kind-specific outcomes.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// How a rule's conditions are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    /// Hit when any condition matches
    #[default]
    Any,
    /// Hit unless some condition fails
    All,
    /// Always hit
    Always,
}

fn default_enabled() -> bool {
    true
}

/// A rule over outcomes of type `O`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule<O> {
    /// Stable identifier used in traces; defaults to the name
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub mode: RuleMode,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default = "Vec::new")]
    pub outcomes: Vec<O>,
    /// Stop evaluating further rules once this one hits
    #[serde(default)]
    pub last_match: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl<O> Rule<O> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            sort_order: 0,
            mode: RuleMode::Any,
            conditions: Vec::new(),
            outcomes: Vec::new(),
            last_match: false,
            enabled: true,
        }
    }

    pub fn with_mode(mut self, mode: RuleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_outcome(mut self, outcome: O) -> Self {
        self.outcomes.push(outcome);
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn last_match(mut self) -> Self {
        self.last_match = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Identifier shown in traces
    pub fn display_id(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::FilterAction;

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let rule: Rule<FilterAction> = toml::from_str(r#"name = "minimal""#).unwrap();

        assert_eq!(rule.mode, RuleMode::Any);
        assert!(rule.enabled);
        assert!(!rule.last_match);
        assert_eq!(rule.sort_order, 0);
        assert_eq!(rule.display_id(), "minimal");
    }

    #[test]
    fn mode_parses_lowercase() {
        let rule: Rule<FilterAction> = toml::from_str(
            r#"
            name = "all"
            mode = "always"
            "#,
        )
        .unwrap();
        assert_eq!(rule.mode, RuleMode::Always);
    }
}
