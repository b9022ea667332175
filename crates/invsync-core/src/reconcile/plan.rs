//! Desired remote state and its difference to the actual state

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::pipeline::RecordOutcome;
use crate::remote::{HostCreate, HostUpdate, OWNER_LABEL, RemoteHost};

/// Desired state of one host
#[derive(Debug, Clone, PartialEq)]
pub struct HostPlan {
    pub key: String,
    pub folder: String,
    pub labels: BTreeMap<String, String>,
    /// Host attributes excluding `labels`
    pub attributes: Map<String, Value>,
    pub remove_attributes: Vec<String>,
    pub dont_move: bool,
}

impl HostPlan {
    /// Build the plan for a non-ignored record
    pub fn from_outcome(outcome: &RecordOutcome, sync_id: &str) -> Self {
        let actions = &outcome.actions;

        let mut labels = outcome.attributes.clone();
        labels.insert(OWNER_LABEL.to_string(), sync_id.to_string());

        let mut attributes = Map::new();
        for name in &actions.attributes {
            if let Some(value) = outcome.attributes.get(name) {
                attributes.insert(name.clone(), Value::String(value.clone()));
            }
        }
        for (name, value) in &actions.custom_attributes {
            attributes.insert(name.clone(), Value::String(value.clone()));
        }
        if !actions.parents.is_empty() {
            attributes.insert("parents".to_string(), Value::from(actions.parents.clone()));
        }

        Self {
            key: outcome.key.clone(),
            folder: actions.folder.clone().unwrap_or_else(|| "/".to_string()),
            labels,
            attributes,
            remove_attributes: actions.remove_attributes.clone(),
            dont_move: actions.dont_move,
        }
    }

    fn labels_json(&self) -> Value {
        Value::Object(
            self.labels
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Create entry with labels folded into the attributes
    pub fn to_create(&self) -> HostCreate {
        let mut attributes = self.attributes.clone();
        attributes.insert("labels".to_string(), self.labels_json());
        HostCreate {
            host_name: self.key.clone(),
            folder: self.folder.clone(),
            attributes,
        }
    }

    /// What has to change on `remote` to reach this plan
    pub fn diff(&self, remote: &RemoteHost) -> HostDiff {
        let move_to = (!self.dont_move && remote.folder != self.folder).then(|| self.folder.clone());

        let mut update = HostUpdate {
            host_name: self.key.clone(),
            ..HostUpdate::default()
        };
        for (name, value) in &self.attributes {
            if remote.attributes.get(name) != Some(value) {
                update.update_attributes.insert(name.clone(), value.clone());
            }
        }
        if remote.labels != self.labels {
            update
                .update_attributes
                .insert("labels".to_string(), self.labels_json());
        }
        for name in &self.remove_attributes {
            if remote.attributes.contains_key(name) && !self.attributes.contains_key(name) {
                update.remove_attributes.push(name.clone());
            }
        }

        HostDiff { move_to, update }
    }
}

/// Changes needed for one existing host
#[derive(Debug, Clone, PartialEq)]
pub struct HostDiff {
    pub move_to: Option<String>,
    pub update: HostUpdate,
}

impl HostDiff {
    pub fn is_empty(&self) -> bool {
        self.move_to.is_none() && self.update.is_empty()
    }
}

/// Desired state of a cluster host
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPlan {
    pub host: HostPlan,
    pub nodes: Vec<String>,
}

impl ClusterPlan {
    /// Whether `remote` nodes differ, ignoring order
    pub fn nodes_differ(&self, remote: Option<&[String]>) -> bool {
        let wanted: BTreeSet<&String> = self.nodes.iter().collect();
        let actual: BTreeSet<&String> = remote.unwrap_or_default().iter().collect();
        wanted != actual
    }
}

/// Everything the apply phase will do
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub hosts: BTreeMap<String, HostPlan>,
    pub clusters: BTreeMap<String, ClusterPlan>,
    pub ignored: BTreeSet<String>,
    /// Records whose evaluation failed; their remote hosts are left alone
    pub failed: BTreeSet<String>,
}

impl SyncPlan {
    /// Classify one evaluated record
    pub fn add(&mut self, outcome: &RecordOutcome, sync_id: &str) {
        if outcome.ignore {
            self.ignored.insert(outcome.key.clone());
            return;
        }
        let host = HostPlan::from_outcome(outcome, sync_id);
        if outcome.actions.create_cluster.is_empty() {
            self.hosts.insert(host.key.clone(), host);
        } else {
            self.clusters.insert(
                host.key.clone(),
                ClusterPlan {
                    host,
                    nodes: outcome.actions.create_cluster.clone(),
                },
            );
        }
    }

    /// Whether `key` is planned as host or cluster
    pub fn contains(&self, key: &str) -> bool {
        self.hosts.contains_key(key) || self.clusters.contains_key(key)
    }
}
