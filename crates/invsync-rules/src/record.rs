//! Inventory record type
//!
//! A Record is one machine or object in the local store. Its attributes
//! (labels) drive rule evaluation; the cache holds derived values and is
//! cleared whenever attributes or inventory change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which importer owns a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttribution {
    /// Identifier of the source account
    #[serde(default)]
    pub owner_id: String,
    /// Human-readable name of the source account
    #[serde(default)]
    pub owner_name: String,
}

/// A record in the local inventory store
///
/// Fields unknown to this struct are dropped when a record is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Globally unique key (hostname)
    pub key: String,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default)]
    extended_attributes: BTreeMap<String, Value>,
    /// Folder pool seat held by this record, if any
    #[serde(default)]
    pub pinned_folder: Option<String>,
    /// Importer that owns this record
    #[serde(default)]
    pub source: SourceAttribution,
    /// Derived values; cleared on attribute or inventory change
    #[serde(default)]
    pub cache: BTreeMap<String, Value>,
    /// When attributes or inventory last changed
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    /// When the record was last written to a target system
    #[serde(default)]
    pub last_export: Option<DateTime<Utc>>,
}

impl Record {
    /// Create an empty record with the given key
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attributes: BTreeMap::new(),
            extended_attributes: BTreeMap::new(),
            pinned_folder: None,
            source: SourceAttribution::default(),
            cache: BTreeMap::new(),
            last_update: None,
            last_export: None,
        }
    }

    /// Labels used by rule conditions
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Inventory data
    pub fn extended_attributes(&self) -> &BTreeMap<String, Value> {
        &self.extended_attributes
    }

    /// Get a single label value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Replace all labels, clearing the cache if they changed
    pub fn set_attributes(&mut self, attributes: BTreeMap<String, String>) {
        if self.attributes != attributes {
            self.attributes = attributes;
            self.invalidate();
        }
    }

    /// Set one label, clearing the cache if the value changed
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if self.attributes.get(&name) != Some(&value) {
            self.attributes.insert(name, value);
            self.invalidate();
        }
    }

    /// Replace inventory data, clearing the cache if it changed
    pub fn set_extended_attributes(&mut self, inventory: BTreeMap<String, Value>) {
        if self.extended_attributes != inventory {
            self.extended_attributes = inventory;
            self.invalidate();
        }
    }

    /// Copy of this record with a different label set
    ///
    /// Used to evaluate action rules against already filtered and rewritten
    /// attributes. The copy starts with an empty cache.
    pub fn with_attributes(&self, attributes: BTreeMap<String, String>) -> Self {
        let mut view = self.clone();
        view.attributes = attributes;
        view.cache.clear();
        view
    }

    /// Mark the record as exported now
    pub fn touch_export(&mut self) {
        self.last_export = Some(Utc::now());
    }

    fn invalidate(&mut self) {
        self.cache.clear();
        self.last_update = Some(Utc::now());
    }
}
