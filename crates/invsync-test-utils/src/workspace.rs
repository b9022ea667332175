//! [`TestWorkspace`]: a temporary directory laid out like a real installation.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use invsync_core::{FileRecordStore, RecordStore};
use invsync_rules::Record;

/// A temporary directory holding `invsync.toml`, `rules.toml`, `pools.toml`
/// and a `records/` directory, all at their default locations.
///
/// # Example
///
/// ```rust,no_run
/// use invsync_test_utils::{RecordBuilder, TestWorkspace};
///
/// let ws = TestWorkspace::new();
/// ws.write_manifest("[accounts.prod]\naddress = \"http://localhost\"\n");
/// ws.add_record(&RecordBuilder::new("web01").attribute("env", "prod").build());
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("invsync.toml")
    }

    pub fn write_manifest(&self, content: &str) {
        fs::write(self.config_path(), content).unwrap();
    }

    pub fn write_rules(&self, content: &str) {
        fs::write(self.root().join("rules.toml"), content).unwrap();
    }

    pub fn write_pools(&self, content: &str) {
        fs::write(self.root().join("pools.toml"), content).unwrap();
    }

    pub fn read_pools(&self) -> String {
        fs::read_to_string(self.root().join("pools.toml")).unwrap_or_default()
    }

    fn store(&self) -> FileRecordStore {
        FileRecordStore::new(self.root().join("records")).unwrap()
    }

    pub fn add_record(&self, record: &Record) {
        self.store().save(record).unwrap();
    }

    pub fn record(&self, key: &str) -> Option<Record> {
        self.store().get(key).unwrap()
    }
}
