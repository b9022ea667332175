//! Manifest parsing for `invsync.toml`

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

fn default_records() -> PathBuf {
    PathBuf::from("records")
}

fn default_rules() -> PathBuf {
    PathBuf::from("rules.toml")
}

fn default_pools() -> PathBuf {
    PathBuf::from("pools.toml")
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    500
}

fn default_workers() -> usize {
    4
}

fn default_delete_limit() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

/// Where local state lives, relative to the manifest's directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsSection {
    /// Directory with one JSON file per record
    #[serde(default = "default_records")]
    pub records: PathBuf,

    /// Rule set file
    #[serde(default = "default_rules")]
    pub rules: PathBuf,

    /// Folder pool state file
    #[serde(default = "default_pools")]
    pub pools: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            records: default_records(),
            rules: default_rules(),
            pools: default_pools(),
        }
    }
}

/// One target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Base URL of the remote REST API
    pub address: String,

    #[serde(default)]
    pub username: String,

    /// Environment variable holding the API secret
    #[serde(default)]
    pub password_env: Option<String>,

    /// Ownership label value; defaults to the account name
    #[serde(default)]
    pub sync_id: Option<String>,

    /// Use bulk endpoints for create and update
    #[serde(default = "default_true")]
    pub bulk: bool,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Fetch hosts folder by folder instead of in one call
    #[serde(default)]
    pub fetch_by_folder: bool,

    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Cleanup deletes nothing when more orphans than this are found
    #[serde(default = "default_delete_limit")]
    pub delete_limit: usize,

    /// Only sync records owned by these sources; empty means all
    #[serde(default)]
    pub limit_by_owners: Vec<String>,

    #[serde(default = "default_true")]
    pub verify_tls: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AccountConfig {
    /// Account pointing at `address` with every other setting at its default
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: String::new(),
            password_env: None,
            sync_id: None,
            bulk: true,
            chunk_size: default_chunk_size(),
            fetch_by_folder: false,
            workers: default_workers(),
            delete_limit: default_delete_limit(),
            limit_by_owners: Vec::new(),
            verify_tls: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Parsed `invsync.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

impl Manifest {
    /// Parse a manifest from TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;
        Ok(manifest)
    }

    /// Create an empty manifest with default values
    pub fn empty() -> Self {
        Self::default()
    }
}
