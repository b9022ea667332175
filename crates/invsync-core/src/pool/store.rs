//! Folder pool persistence

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::FolderPool;
use crate::Result;

/// Load and save the full pool list
pub trait PoolStore: Send + Sync {
    fn load(&self) -> Result<Vec<FolderPool>>;
    fn save(&self, pools: &[FolderPool]) -> Result<()>;
}

/// In-memory [`PoolStore`]
#[derive(Debug, Default)]
pub struct MemoryPoolStore {
    pools: Mutex<Vec<FolderPool>>,
}

impl MemoryPoolStore {
    pub fn new(pools: Vec<FolderPool>) -> Self {
        Self {
            pools: Mutex::new(pools),
        }
    }

    /// Pools as last saved
    pub fn snapshot(&self) -> Vec<FolderPool> {
        self.pools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PoolStore for MemoryPoolStore {
    fn load(&self) -> Result<Vec<FolderPool>> {
        Ok(self.snapshot())
    }

    fn save(&self, pools: &[FolderPool]) -> Result<()> {
        *self.pools.lock().unwrap_or_else(PoisonError::into_inner) = pools.to_vec();
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PoolFile {
    #[serde(default, rename = "pool")]
    pools: Vec<FolderPool>,
}

/// [`PoolStore`] backed by a TOML file of `[[pool]]` tables
///
/// A missing file loads as no pools.
#[derive(Debug, Clone)]
pub struct TomlPoolStore {
    path: PathBuf,
}

impl TomlPoolStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PoolStore for TomlPoolStore {
    fn load(&self) -> Result<Vec<FolderPool>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut content = String::new();
        (&file).read_to_string(&mut content)?;
        let parsed: PoolFile = toml::from_str(&content)?;
        Ok(parsed.pools)
    }

    fn save(&self, pools: &[FolderPool]) -> Result<()> {
        let content = toml::to_string_pretty(&PoolFile {
            pools: pools.to_vec(),
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        lock_file.lock_exclusive()?;

        let temp_path = self.path.with_extension("toml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
