//! [`RecordBuilder`] for test records.

use invsync_rules::{Record, SourceAttribution};

/// Builds a [`Record`] attribute by attribute.
///
/// ```rust
/// use invsync_test_utils::RecordBuilder;
///
/// let record = RecordBuilder::new("web01").attribute("env", "prod").build();
/// assert_eq!(record.attribute("env"), Some("prod"));
/// ```
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new(key: &str) -> Self {
        Self {
            record: Record::new(key),
        }
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.record.set_attribute(name, value);
        self
    }

    /// Set the importer that owns the record.
    pub fn owner(mut self, id: &str, name: &str) -> Self {
        self.record.source = SourceAttribution {
            owner_id: id.to_string(),
            owner_name: name.to_string(),
        };
        self
    }

    /// Pretend the record already holds a seat in `folder`.
    pub fn pinned(mut self, folder: &str) -> Self {
        self.record.pinned_folder = Some(folder.to_string());
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}
