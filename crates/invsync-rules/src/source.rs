//! Rule sources
//!
//! Rules are grouped by kind in a [`RuleSet`]. The TOML layout is:
//!
//! ```toml
//! [[filter]]
//! name = "labels"
//! mode = "always"
//! outcomes = [{ action = "whitelist_attribute", attribute = "env" }]
//!
//! [[action]]
//! name = "prod"
//! conditions = [{ target = "attribute", name = { operator = "equal", needle = "env" }, value = { operator = "equal", needle = "prod" } }]
//! outcomes = [{ action = "move_folder", folder = "/prod" }]
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::Result;
use crate::outcome::{Action, FilterAction, RewriteAction};
use crate::rule::Rule;

/// All rules used for one sync run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub filter: Vec<Rule<FilterAction>>,
    #[serde(default)]
    pub rewrite: Vec<Rule<RewriteAction>>,
    #[serde(default)]
    pub action: Vec<Rule<Action>>,
}

impl RuleSet {
    /// Parse a rule set from TOML
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Copy with disabled rules dropped and each list sorted by `sort_order`
    pub fn prepared(&self) -> Self {
        fn prep<O: Clone>(rules: &[Rule<O>]) -> Vec<Rule<O>> {
            let mut out: Vec<Rule<O>> = rules.iter().filter(|r| r.enabled).cloned().collect();
            out.sort_by_key(|r| r.sort_order);
            out
        }
        Self {
            filter: prep(&self.filter),
            rewrite: prep(&self.rewrite),
            action: prep(&self.action),
        }
    }

    /// Hex SHA-256 over the filter and rewrite rules
    ///
    /// Changes whenever a rule that shapes exported attributes changes, so it
    /// can key an attribute cache.
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&self.filter)?);
        hasher.update(b"\n");
        hasher.update(serde_json::to_vec(&self.rewrite)?);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty() && self.rewrite.is_empty() && self.action.is_empty()
    }
}

/// Supplies the rule set for a run
pub trait RuleSource: Send + Sync {
    fn load(&self) -> Result<RuleSet>;
}

impl RuleSource for RuleSet {
    fn load(&self) -> Result<RuleSet> {
        Ok(self.clone())
    }
}

/// Rules read from a TOML file
///
/// A missing file yields an empty rule set.
#[derive(Debug, Clone)]
pub struct TomlRuleSource {
    path: PathBuf,
}

impl TomlRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for TomlRuleSource {
    fn load(&self) -> Result<RuleSet> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No rule file, using empty rule set");
            return Ok(RuleSet::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let rules = RuleSet::parse(&content)?;
        debug!(
            path = %self.path.display(),
            filter = rules.filter.len(),
            rewrite = rules.rewrite.len(),
            action = rules.action.len(),
            "Loaded rules"
        );
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use tempfile::TempDir;

    const RULES: &str = r#"
        [[filter]]
        name = "labels"
        mode = "always"
        outcomes = [{ action = "whitelist_attribute", attribute = "env" }]

        [[rewrite]]
        name = "lower"
        mode = "always"
        outcomes = [{ action = "value_string", attribute = "managed", value = "yes" }]

        [[action]]
        name = "late"
        sort_order = 20
        mode = "always"
        outcomes = [{ action = "dont_move" }]

        [[action]]
        name = "early"
        sort_order = 10
        outcomes = [{ action = "move_folder", folder = "/prod" }]

        [[action.conditions]]
        target = "attribute"
        name = { operator = "equal", needle = "env" }
        value = { operator = "equal", needle = "prod" }

        [[action]]
        name = "off"
        enabled = false
        mode = "always"
        outcomes = [{ action = "dont_move" }]
    "#;

    #[test]
    fn parses_all_rule_kinds() {
        let rules = RuleSet::parse(RULES).unwrap();
        assert_eq!(rules.filter.len(), 1);
        assert_eq!(rules.rewrite.len(), 1);
        assert_eq!(rules.action.len(), 3);
        assert_eq!(
            rules.action[1].conditions,
            vec![Condition::attribute_equals("env", "prod")]
        );
    }

    #[test]
    fn prepared_sorts_and_drops_disabled() {
        let rules = RuleSet::parse(RULES).unwrap().prepared();
        let names: Vec<_> = rules.action.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn fingerprint_ignores_action_rules() {
        let rules = RuleSet::parse(RULES).unwrap();
        let mut changed = rules.clone();
        changed.action.clear();
        assert_eq!(rules.fingerprint().unwrap(), changed.fingerprint().unwrap());

        changed.filter.clear();
        assert_ne!(rules.fingerprint().unwrap(), changed.fingerprint().unwrap());
    }

    #[test]
    fn toml_source_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, RULES).unwrap();

        let rules = TomlRuleSource::new(&path).load().unwrap();
        assert_eq!(rules.action.len(), 3);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let rules = TomlRuleSource::new(dir.path().join("none.toml"))
            .load()
            .unwrap();
        assert!(rules.is_empty());
    }
}
