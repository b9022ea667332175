//! Action outcomes: placement, attribute and cluster decisions
//!
//! Folder-producing actions (`move_folder`, `folder_pool`, `tag_as_folder`,
//! `value_as_folder`) all append to one path, so several hits build a nested
//! folder segment by segment. List-valued keys are appended, never replaced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::engine::{EvalContext, OutcomeBuilder};
use crate::folder::format_folder_path;
use crate::template::render;
use crate::{Error, Result};

/// Capacity-bounded folder pool seats
///
/// Implementations must be safe to call from several worker threads.
pub trait SeatAllocator: Send + Sync {
    /// Take a seat in the first pool (by name) with room, limited to
    /// `candidates` unless it is empty
    fn allocate(&self, candidates: &[String]) -> Result<Option<String>>;

    /// Pool that [`allocate`](Self::allocate) would pick, without taking a seat
    fn peek(&self, candidates: &[String]) -> Option<String>;

    /// Give back a seat in the pool named `folder`
    fn release(&self, folder: &str) -> Result<()>;

    /// Whether `folder` names an enabled pool
    fn is_pool(&self, folder: &str) -> bool;
}

/// Raw outcome of an action rule
///
/// String parameters may contain `{{ attribute }}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Append a folder path
    MoveFolder { folder: String },
    /// Append the folder of a pool seat
    FolderPool {
        #[serde(default)]
        pools: Vec<String>,
    },
    /// Append the name of every attribute whose value equals `value`
    TagAsFolder { value: String },
    /// Append the value of `attribute`
    ValueAsFolder { attribute: String },
    /// Export attribute `name` as a host attribute
    Attribute { name: String },
    /// Set a host attribute to a fixed value
    CustomAttribute { name: String, value: String },
    /// Remove a host attribute on the remote side
    RemoveAttribute { name: String },
    /// Turn the host into a cluster of these nodes
    CreateCluster { nodes: Vec<String> },
    /// Set parent hosts
    Parents { parents: Vec<String> },
    /// Leave an existing host in its current folder
    DontMove,
}

impl Action {
    /// Action id as written in rule files
    pub fn id(&self) -> &'static str {
        match self {
            Action::MoveFolder { .. } => "move_folder",
            Action::FolderPool { .. } => "folder_pool",
            Action::TagAsFolder { .. } => "tag_as_folder",
            Action::ValueAsFolder { .. } => "value_as_folder",
            Action::Attribute { .. } => "attribute",
            Action::CustomAttribute { .. } => "custom_attribute",
            Action::RemoveAttribute { .. } => "remove_attribute",
            Action::CreateCluster { .. } => "create_cluster",
            Action::Parents { .. } => "parents",
            Action::DontMove => "dont_move",
        }
    }
}

/// Accumulated action result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Normalized target folder, `None` if no folder action hit
    pub folder: Option<String>,
    pub attributes: Vec<String>,
    pub custom_attributes: BTreeMap<String, String>,
    pub remove_attributes: Vec<String>,
    pub create_cluster: Vec<String>,
    pub parents: Vec<String>,
    pub dont_move: bool,
    /// A `folder_pool` action hit
    pub pool_matched: bool,
    /// Pool folder the record holds a seat in after this evaluation
    pub pool: Option<String>,
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Builder for [`Action`] rules
pub struct ActionBuilder<'a> {
    allocator: Option<&'a dyn SeatAllocator>,
    pool_checked: bool,
    /// Folder path accumulated over all hits
    path: String,
}

impl<'a> ActionBuilder<'a> {
    pub fn new(allocator: Option<&'a dyn SeatAllocator>) -> Self {
        Self {
            allocator,
            pool_checked: false,
            path: String::new(),
        }
    }

    fn push_folder(&mut self, segment: &str) {
        if segment.trim_matches('/').is_empty() {
            return;
        }
        self.path.push_str(&format_folder_path(segment));
    }

    fn pool_folder(&self, ctx: &EvalContext<'_>, candidates: &[String]) -> Result<String> {
        let key = &ctx.record.key;
        let allocator = self
            .allocator
            .ok_or_else(|| Error::PoolsUnavailable { key: key.clone() })?;

        let pinned = ctx.record.pinned_folder.as_ref();
        if let Some(pinned) = pinned {
            let eligible = candidates.is_empty() || candidates.contains(pinned);
            if eligible && allocator.is_pool(pinned) {
                return Ok(pinned.clone());
            }
        }

        let folder = allocator
            .allocate(candidates)?
            .ok_or_else(|| Error::AllocationExhausted { key: key.clone() })?;
        debug!(record = %key, folder = %folder, "Allocated pool seat");

        // The old seat is only given back once the new one is held
        if let Some(pinned) = pinned {
            debug!(record = %key, folder = %pinned, "Releasing stale pool seat");
            allocator.release(pinned)?;
        }
        Ok(folder)
    }
}

impl OutcomeBuilder for ActionBuilder<'_> {
    type Raw = Action;
    type Output = ActionOutcome;

    fn merge(
        &mut self,
        ctx: &EvalContext<'_>,
        outcomes: &[Action],
        acc: &mut ActionOutcome,
    ) -> Result<()> {
        let attributes = ctx.record.attributes();
        for outcome in outcomes {
            match outcome {
                Action::MoveFolder { folder } => {
                    self.push_folder(&render(folder, attributes)?);
                }
                Action::FolderPool { pools } => {
                    if self.pool_checked {
                        continue;
                    }
                    self.pool_checked = true;
                    let candidates = pools
                        .iter()
                        .map(|p| render(p, attributes))
                        .collect::<Result<Vec<_>>>()?;
                    let folder = self.pool_folder(ctx, &candidates)?;
                    self.push_folder(&folder);
                    acc.pool_matched = true;
                    acc.pool = Some(folder);
                }
                Action::TagAsFolder { value } => {
                    let value = render(value, attributes)?;
                    for (name, attr_value) in attributes {
                        if *attr_value == value {
                            self.push_folder(name);
                        }
                    }
                }
                Action::ValueAsFolder { attribute } => {
                    if let Some(value) = attributes.get(&render(attribute, attributes)?) {
                        self.push_folder(value);
                    }
                }
                Action::Attribute { name } => {
                    push_unique(&mut acc.attributes, render(name, attributes)?);
                }
                Action::CustomAttribute { name, value } => {
                    acc.custom_attributes
                        .insert(render(name, attributes)?, render(value, attributes)?);
                }
                Action::RemoveAttribute { name } => {
                    push_unique(&mut acc.remove_attributes, render(name, attributes)?);
                }
                Action::CreateCluster { nodes } => {
                    for node in nodes {
                        push_unique(&mut acc.create_cluster, render(node, attributes)?);
                    }
                }
                Action::Parents { parents } => {
                    for parent in parents {
                        push_unique(&mut acc.parents, render(parent, attributes)?);
                    }
                }
                Action::DontMove => acc.dont_move = true,
            }
        }
        Ok(())
    }

    fn finish(&mut self, _ctx: &EvalContext<'_>, acc: &mut ActionOutcome) -> Result<()> {
        let path = std::mem::take(&mut self.path);
        if !path.is_empty() {
            acc.folder = Some(format_folder_path(&path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::engine::evaluate;
    use crate::record::Record;
    use crate::rule::{Rule, RuleMode};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Single pool with a fixed capacity
    struct OnePool {
        name: String,
        capacity: u32,
        taken: Mutex<u32>,
    }

    impl OnePool {
        fn new(name: &str, capacity: u32) -> Self {
            Self {
                name: name.to_string(),
                capacity,
                taken: Mutex::new(0),
            }
        }
    }

    impl SeatAllocator for OnePool {
        fn allocate(&self, candidates: &[String]) -> Result<Option<String>> {
            if !candidates.is_empty() && !candidates.contains(&self.name) {
                return Ok(None);
            }
            let mut taken = self.taken.lock().unwrap();
            if *taken < self.capacity {
                *taken += 1;
                Ok(Some(self.name.clone()))
            } else {
                Ok(None)
            }
        }

        fn peek(&self, candidates: &[String]) -> Option<String> {
            let eligible = candidates.is_empty() || candidates.contains(&self.name);
            (eligible && *self.taken.lock().unwrap() < self.capacity).then(|| self.name.clone())
        }

        fn release(&self, folder: &str) -> Result<()> {
            if folder == self.name {
                let mut taken = self.taken.lock().unwrap();
                *taken = taken.saturating_sub(1);
            }
            Ok(())
        }

        fn is_pool(&self, folder: &str) -> bool {
            folder == self.name
        }
    }

    fn record() -> Record {
        let mut record = Record::new("web01");
        record.set_attribute("env", "prod");
        record.set_attribute("site", "Berlin");
        record.set_attribute("role", "web");
        record
    }

    fn always(actions: Vec<Action>) -> Rule<Action> {
        let mut rule = Rule::new("always").with_mode(RuleMode::Always);
        rule.outcomes = actions;
        rule
    }

    fn run(rules: &[Rule<Action>], record: &Record, pool: Option<&OnePool>) -> Result<ActionOutcome> {
        let allocator = pool.map(|p| p as &dyn SeatAllocator);
        let mut builder = ActionBuilder::new(allocator);
        evaluate(rules, &mut builder, &EvalContext::new(record)).map(|e| e.outcome)
    }

    #[test]
    fn folder_actions_append_segments() {
        let rules = vec![
            always(vec![Action::MoveFolder {
                folder: "/DC".to_string(),
            }])
            .with_sort_order(1),
            always(vec![Action::ValueAsFolder {
                attribute: "site".to_string(),
            }])
            .with_sort_order(2),
            always(vec![Action::TagAsFolder {
                value: "web".to_string(),
            }])
            .with_sort_order(3),
        ];
        let outcome = run(&rules, &record(), None).unwrap();
        assert_eq!(outcome.folder.as_deref(), Some("/dc/berlin/role"));
    }

    #[test]
    fn template_in_move_folder() {
        let rules = vec![always(vec![Action::MoveFolder {
            folder: "/{{ env }}/{{site}}".to_string(),
        }])];
        let outcome = run(&rules, &record(), None).unwrap();
        assert_eq!(outcome.folder.as_deref(), Some("/prod/berlin"));
    }

    #[test]
    fn empty_folder_is_discarded() {
        let rules = vec![always(vec![Action::ValueAsFolder {
            attribute: "missing".to_string(),
        }])];
        let outcome = run(&rules, &record(), None).unwrap();
        assert_eq!(outcome.folder, None);
    }

    #[test]
    fn list_outcomes_append_across_rules() {
        let rules = vec![
            always(vec![
                Action::Attribute {
                    name: "env".to_string(),
                },
                Action::RemoveAttribute {
                    name: "alias".to_string(),
                },
            ]),
            always(vec![
                Action::Attribute {
                    name: "site".to_string(),
                },
                Action::CustomAttribute {
                    name: "tag_agent".to_string(),
                    value: "cmk-agent".to_string(),
                },
                Action::CreateCluster {
                    nodes: vec!["{{ role }}01".to_string(), "{{ role }}02".to_string()],
                },
                Action::DontMove,
            ]),
        ];
        let outcome = run(&rules, &record(), None).unwrap();

        assert_eq!(outcome.attributes, vec!["env", "site"]);
        assert_eq!(outcome.remove_attributes, vec!["alias"]);
        assert_eq!(outcome.create_cluster, vec!["web01", "web02"]);
        assert_eq!(
            outcome.custom_attributes.get("tag_agent").map(String::as_str),
            Some("cmk-agent")
        );
        assert!(outcome.dont_move);
    }

    #[test]
    fn folder_pool_allocates_once_per_evaluation() {
        let pool = OnePool::new("pool-a", 5);
        let rules = vec![
            always(vec![Action::FolderPool { pools: vec![] }]).with_sort_order(1),
            always(vec![Action::FolderPool { pools: vec![] }]).with_sort_order(2),
        ];
        let outcome = run(&rules, &record(), Some(&pool)).unwrap();

        assert_eq!(outcome.folder.as_deref(), Some("/pool-a"));
        assert_eq!(outcome.pool.as_deref(), Some("pool-a"));
        assert!(outcome.pool_matched);
        assert_eq!(*pool.taken.lock().unwrap(), 1);
    }

    #[test]
    fn pinned_record_reuses_its_seat() {
        let pool = OnePool::new("pool-a", 1);
        *pool.taken.lock().unwrap() = 1;
        let mut record = record();
        record.pinned_folder = Some("pool-a".to_string());

        let rules = vec![always(vec![Action::FolderPool { pools: vec![] }])];
        let outcome = run(&rules, &record, Some(&pool)).unwrap();

        assert_eq!(outcome.pool.as_deref(), Some("pool-a"));
        assert_eq!(*pool.taken.lock().unwrap(), 1);
    }

    #[test]
    fn stale_pin_moves_to_an_eligible_pool() {
        let pool = OnePool::new("pool-a", 2);
        let mut record = record();
        record.pinned_folder = Some("retired".to_string());

        let rules = vec![always(vec![Action::FolderPool { pools: vec![] }])];
        let outcome = run(&rules, &record, Some(&pool)).unwrap();

        assert_eq!(outcome.pool.as_deref(), Some("pool-a"));
        assert_eq!(*pool.taken.lock().unwrap(), 1);
    }

    #[test]
    fn exhausted_pool_is_an_error() {
        let pool = OnePool::new("pool-a", 1);
        let rules = vec![always(vec![Action::FolderPool { pools: vec![] }])];

        let first = Record::new("a");
        let second = Record::new("b");
        assert!(run(&rules, &first, Some(&pool)).is_ok());
        let err = run(&rules, &second, Some(&pool)).unwrap_err();
        assert!(matches!(err, Error::AllocationExhausted { ref key } if key == "b"));
    }

    #[test]
    fn malformed_template_fails_the_record() {
        let rules = vec![always(vec![Action::MoveFolder {
            folder: "/{{ env".to_string(),
        }])];
        let err = run(&rules, &record(), None).unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
    }

    #[test]
    fn folder_pool_without_allocator_fails() {
        let rules = vec![always(vec![Action::FolderPool { pools: vec![] }])];
        let err = run(&rules, &record(), None).unwrap_err();
        assert!(matches!(err, Error::PoolsUnavailable { .. }));
    }

    #[test]
    fn conditions_gate_actions() {
        let rules = vec![
            Rule::new("prod only")
                .with_condition(Condition::attribute_equals("env", "dev"))
                .with_outcome(Action::MoveFolder {
                    folder: "/dev".to_string(),
                }),
        ];
        let outcome = run(&rules, &record(), None).unwrap();
        assert_eq!(outcome.folder, None);
    }

    #[test]
    fn actions_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            outcomes: Vec<Action>,
        }
        let parsed: Wrapper = toml::from_str(
            r#"
            outcomes = [
                { action = "move_folder", folder = "/prod" },
                { action = "folder_pool" },
                { action = "dont_move" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.outcomes[0].id(), "move_folder");
        assert_eq!(parsed.outcomes[1], Action::FolderPool { pools: vec![] });
        assert_eq!(parsed.outcomes[2], Action::DontMove);
    }
}
