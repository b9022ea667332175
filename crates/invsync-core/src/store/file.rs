//! File-backed record store
//!
//! Each record lives in `<dir>/<key>.json`. Reads take a shared lock and
//! writes take an exclusive lock, write a temporary file and rename it over
//! the target.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

use invsync_rules::Record;

use super::{RecordFilter, RecordStore};
use crate::{Error, Result};

/// [`RecordStore`] over a directory of JSON files
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    /// Open a store in `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if !is_safe_key(key) {
            return Err(Error::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn load(path: &Path) -> Result<Record> {
        let file = File::open(path)?;
        file.lock_shared()?;

        let mut content = String::new();
        (&file).read_to_string(&mut content)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Keys become file names, so only a conservative character set is allowed
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

impl RecordStore for FileRecordStore {
    fn get(&self, key: &str) -> Result<Option<Record>> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::load(&path) {
                Ok(record) if filter.matches(&record) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), "Skipping unreadable record: {}", e),
            }
        }
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    fn save(&self, record: &Record) -> Result<()> {
        let path = self.path_for(&record.key)?;
        let content = serde_json::to_string_pretty(record)?;

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        lock_file.lock_exclusive()?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }
}
