use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use invsync_rules::Record;

use super::{RecordFilter, RecordStore};
use crate::Result;

/// In-memory [`RecordStore`]
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<String, Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let map = records.into_iter().map(|r| (r.key.clone(), r)).collect();
        Self {
            records: Mutex::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.lock().get(key).cloned())
    }

    fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        Ok(self
            .lock()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn save(&self, record: &Record) -> Result<()> {
        self.lock().insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(key: &str, owner: &str) -> Record {
        let mut record = Record::new(key);
        record.source.owner_id = owner.to_string();
        record
    }

    #[test]
    fn list_filters_by_owner() {
        let store =
            MemoryRecordStore::with_records([owned("b", "cmdb"), owned("a", "csv"), owned("c", "cmdb")]);

        let keys: Vec<_> = store
            .list(&RecordFilter::owners(["cmdb"]))
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert_eq!(store.list(&RecordFilter::all()).unwrap().len(), 3);
    }

    #[test]
    fn save_get_delete() {
        let store = MemoryRecordStore::new();
        store.save(&Record::new("web01")).unwrap();
        assert!(store.get("web01").unwrap().is_some());
        assert!(store.delete("web01").unwrap());
        assert!(!store.delete("web01").unwrap());
        assert!(store.is_empty());
    }
}
