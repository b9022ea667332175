//! Filter outcomes: which attributes may leave the local store

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Result;
use crate::engine::{EvalContext, Evaluation, OutcomeBuilder, evaluate};
use crate::rule::Rule;

/// Raw outcome of a filter rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FilterAction {
    /// Pass an attribute through; a trailing `*` passes every attribute with that prefix
    WhitelistAttribute { attribute: String },
    /// Do not sync the record at all
    IgnoreHost,
}

/// Accumulated filter result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub attributes: BTreeMap<String, String>,
    pub ignore: bool,
}

/// Builder for [`FilterAction`] rules
#[derive(Debug, Default)]
pub struct FilterBuilder;

impl OutcomeBuilder for FilterBuilder {
    type Raw = FilterAction;
    type Output = FilterOutcome;

    fn merge(
        &mut self,
        ctx: &EvalContext<'_>,
        outcomes: &[FilterAction],
        acc: &mut FilterOutcome,
    ) -> Result<()> {
        let known = ctx.record.attributes();
        for outcome in outcomes {
            match outcome {
                FilterAction::WhitelistAttribute { attribute } => {
                    if let Some(prefix) = attribute.strip_suffix('*') {
                        for (name, value) in known.range(prefix.to_string()..) {
                            if !name.starts_with(prefix) {
                                break;
                            }
                            acc.attributes.insert(name.clone(), value.clone());
                        }
                    } else if let Some(value) = known.get(attribute) {
                        acc.attributes.insert(attribute.clone(), value.clone());
                    }
                }
                FilterAction::IgnoreHost => acc.ignore = true,
            }
        }
        Ok(())
    }
}

/// Run filter rules, passing every attribute through when there are none
pub fn filter_attributes(
    rules: &[Rule<FilterAction>],
    ctx: &EvalContext<'_>,
) -> Result<Evaluation<FilterOutcome>> {
    if !rules.iter().any(|r| r.enabled) {
        return Ok(Evaluation {
            outcome: FilterOutcome {
                attributes: ctx.record.attributes().clone(),
                ignore: false,
            },
            trace: Vec::new(),
            rules_evaluated: 0,
        });
    }
    evaluate(rules, &mut FilterBuilder, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::record::Record;
    use crate::rule::RuleMode;
    use pretty_assertions::assert_eq;

    fn record() -> Record {
        let mut record = Record::new("web01");
        record.set_attribute("env", "prod");
        record.set_attribute("net_vlan", "12");
        record.set_attribute("net_zone", "dmz");
        record.set_attribute("owner", "ops");
        record
    }

    fn whitelist(attribute: &str) -> FilterAction {
        FilterAction::WhitelistAttribute {
            attribute: attribute.to_string(),
        }
    }

    #[test]
    fn whitelists_single_attribute() {
        let rules = vec![
            Rule::new("env only")
                .with_mode(RuleMode::Always)
                .with_outcome(whitelist("env"))
                .with_outcome(whitelist("missing")),
        ];
        let record = record();
        let result = filter_attributes(&rules, &EvalContext::new(&record)).unwrap();

        let mut expected = BTreeMap::new();
        expected.insert("env".to_string(), "prod".to_string());
        assert_eq!(result.outcome.attributes, expected);
        assert!(!result.outcome.ignore);
    }

    #[test]
    fn wildcard_copies_prefix() {
        let rules = vec![
            Rule::new("net")
                .with_mode(RuleMode::Always)
                .with_outcome(whitelist("net_*")),
        ];
        let record = record();
        let result = filter_attributes(&rules, &EvalContext::new(&record)).unwrap();

        let names: Vec<_> = result.outcome.attributes.keys().cloned().collect();
        assert_eq!(names, vec!["net_vlan", "net_zone"]);
    }

    #[test]
    fn ignore_host_sets_flag() {
        let rules = vec![
            Rule::new("ignore dev")
                .with_condition(Condition::attribute_equals("owner", "ops"))
                .with_outcome(FilterAction::IgnoreHost),
        ];
        let record = record();
        let result = filter_attributes(&rules, &EvalContext::new(&record)).unwrap();
        assert!(result.outcome.ignore);
        assert!(result.outcome.attributes.is_empty());
    }

    #[test]
    fn no_rules_passes_everything() {
        let record = record();
        let result = filter_attributes(&[], &EvalContext::new(&record)).unwrap();
        assert_eq!(&result.outcome.attributes, record.attributes());
    }
}
