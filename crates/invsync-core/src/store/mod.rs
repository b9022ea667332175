//! Local record storage
//!
//! The reconciler reads and writes records through [`RecordStore`]. Two
//! implementations exist: [`FileRecordStore`] keeps one JSON file per record,
//! [`MemoryRecordStore`] keeps everything in a map.

mod file;
mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

use crate::Result;
use invsync_rules::Record;

/// Which records a listing returns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Accepted `owner_id` or `owner_name` values; empty accepts every record
    pub owners: Vec<String>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn owners(owners: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.owners.is_empty()
            || self
                .owners
                .iter()
                .any(|o| *o == record.source.owner_id || *o == record.source.owner_name)
    }
}

/// Persistence for records
pub trait RecordStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Record>>;

    /// Records accepted by `filter`, ordered by key
    fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>>;

    fn save(&self, record: &Record) -> Result<()>;

    /// Remove a record, returning whether it existed
    fn delete(&self, key: &str) -> Result<bool>;
}
