//! End-to-end rule evaluation: filter, rewrite, then action rules

use invsync_rules::{
    ActionBuilder, EvalContext, Record, RuleSet, evaluate, outcome::filter_attributes,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

const RULES: &str = r#"
[[filter]]
name = "only env and site"
mode = "always"
outcomes = [
    { action = "whitelist_attribute", attribute = "env" },
    { action = "whitelist_attribute", attribute = "cmdb_*" },
]

[[filter]]
name = "skip lab"
outcomes = [{ action = "ignore_host" }]
conditions = [
    { target = "key", operator = "starts_with", needle = "lab-" },
]

[[rewrite]]
name = "strip cmdb prefix"
mode = "always"
outcomes = [{ action = "rename_split", from = "cmdb_site", delimiter = "_", index = 1 }]

[[action]]
name = "prod"
sort_order = 1
last_match = true
outcomes = [
    { action = "move_folder", folder = "/{{ env }}" },
    { action = "attribute", name = "env" },
]
conditions = [
    { target = "attribute", name = { operator = "equal", needle = "env" }, value = { operator = "equal", needle = "prod" } },
]

[[action]]
name = "by site"
sort_order = 2
mode = "always"
outcomes = [{ action = "value_as_folder", attribute = "site" }]
"#;

fn run(record: &Record) -> (bool, BTreeMap<String, String>, Option<String>, Vec<String>) {
    let rules = RuleSet::parse(RULES).unwrap().prepared();
    let ctx = EvalContext::new(record);

    let filtered = filter_attributes(&rules.filter, &ctx).unwrap().outcome;
    let mut attributes = filtered.attributes.clone();
    let mut rewrite = invsync_rules::RewriteBuilder::new(&filtered.attributes);
    evaluate(&rules.rewrite, &mut rewrite, &ctx)
        .unwrap()
        .outcome
        .apply(&mut attributes);

    let view = record.with_attributes(attributes.clone());
    let mut builder = ActionBuilder::new(None);
    let actions = evaluate(&rules.action, &mut builder, &EvalContext::new(&view))
        .unwrap()
        .outcome;
    (filtered.ignore, attributes, actions.folder, actions.attributes)
}

#[test]
fn prod_record_lands_in_prod_folder_with_env_only() {
    let mut record = Record::new("web01");
    record.set_attribute("env", "prod");
    record.set_attribute("owner", "ops");

    let (ignore, attributes, folder, exported) = run(&record);
    assert!(!ignore);
    assert_eq!(attributes.keys().collect::<Vec<_>>(), vec!["env"]);
    assert_eq!(folder.as_deref(), Some("/prod"));
    assert_eq!(exported, vec!["env"]);
}

#[test]
fn last_match_stops_later_rules() {
    let mut record = Record::new("web02");
    record.set_attribute("env", "prod");
    record.set_attribute("cmdb_site", "berlin");

    let (_, attributes, folder, _) = run(&record);
    assert_eq!(attributes.get("site").map(String::as_str), Some("berlin"));
    assert_eq!(folder.as_deref(), Some("/prod"));
}

#[test]
fn non_prod_uses_renamed_site() {
    let mut record = Record::new("web03");
    record.set_attribute("env", "dev");
    record.set_attribute("cmdb_site", "Hamburg");

    let (_, attributes, folder, exported) = run(&record);
    assert!(!attributes.contains_key("cmdb_site"));
    assert_eq!(folder.as_deref(), Some("/hamburg"));
    assert!(exported.is_empty());
}

#[test]
fn key_condition_ignores_lab_hosts() {
    let record = Record::new("lab-printer");
    let (ignore, _, _, _) = run(&record);
    assert!(ignore);
}
