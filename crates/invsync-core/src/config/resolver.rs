//! Configuration resolution with local overlay merge
//!
//! The `ConfigResolver` loads `invsync.toml` and merges an optional
//! `invsync.local.toml` next to it. The overlay wins for scalar values,
//! tables merge key by key and arrays extend with values not yet present.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;

use super::manifest::{AccountConfig, Manifest};

/// A fully resolved account, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub config: AccountConfig,
    /// API secret read from `password_env`
    pub secret: Option<String>,
}

impl Account {
    /// Account without a secret, mostly for tests and in-process transports
    pub fn new(name: impl Into<String>, config: AccountConfig) -> Self {
        Self {
            name: name.into(),
            config,
            secret: None,
        }
    }

    /// Value of the ownership label this account writes
    pub fn sync_id(&self) -> &str {
        self.config.sync_id.as_deref().unwrap_or(&self.name)
    }
}

/// The merged configuration with paths resolved against the manifest's directory
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    root: PathBuf,
    pub manifest: Manifest,
}

impl ResolvedConfig {
    pub fn new(root: impl Into<PathBuf>, manifest: Manifest) -> Self {
        Self {
            root: root.into(),
            manifest,
        }
    }

    /// Directory relative paths are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records_dir(&self) -> PathBuf {
        self.root.join(&self.manifest.paths.records)
    }

    pub fn rules_path(&self) -> PathBuf {
        self.root.join(&self.manifest.paths.rules)
    }

    pub fn pools_path(&self) -> PathBuf {
        self.root.join(&self.manifest.paths.pools)
    }

    /// Look up an account and read its secret from the environment
    pub fn account(&self, name: &str) -> Result<Account> {
        let config = self
            .manifest
            .accounts
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAccount {
                name: name.to_string(),
            })?;

        let secret = match &config.password_env {
            Some(var) => Some(std::env::var(var).map_err(|_| Error::MissingSecret {
                account: name.to_string(),
                var: var.clone(),
            })?),
            None => None,
        };

        Ok(Account {
            name: name.to_string(),
            config,
            secret,
        })
    }
}

/// Resolves configuration from `invsync.toml` plus its local overlay
pub struct ConfigResolver {
    path: PathBuf,
}

impl ConfigResolver {
    /// Create a resolver for the manifest at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the overlay file, `<stem>.local.toml` next to the manifest
    pub fn local_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "invsync".to_string());
        self.path.with_file_name(format!("{stem}.local.toml"))
    }

    pub fn has_config(&self) -> bool {
        self.path.is_file()
    }

    pub fn has_local_overrides(&self) -> bool {
        self.local_path().is_file()
    }

    /// Load and merge the manifest and its overlay
    ///
    /// A missing overlay is skipped. A missing manifest is an error.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        if !self.has_config() {
            return Err(Error::ConfigNotFound {
                path: self.path.clone(),
            });
        }

        tracing::debug!(path = ?self.path, "Loading config");
        let mut merged: Value = toml::from_str(&fs::read_to_string(&self.path)?)?;

        let local_path = self.local_path();
        if local_path.is_file() {
            tracing::debug!(path = ?local_path, "Loading local overrides");
            let overlay: Value = toml::from_str(&fs::read_to_string(&local_path)?)?;
            deep_merge(&mut merged, &overlay);
        }

        let manifest: Manifest = merged.try_into()?;
        let root = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(ResolvedConfig::new(root, manifest))
    }
}

/// Merge `other` into `base`
///
/// Tables merge recursively, arrays extend with unique values and anything
/// else is replaced.
fn deep_merge(base: &mut Value, other: &Value) {
    match (base, other) {
        (Value::Table(base_map), Value::Table(other_map)) => {
            for (key, other_val) in other_map {
                if let Some(base_val) = base_map.get_mut(key) {
                    deep_merge(base_val, other_val);
                } else {
                    base_map.insert(key.clone(), other_val.clone());
                }
            }
        }
        (Value::Array(base_items), Value::Array(other_items)) => {
            for item in other_items {
                if !base_items.contains(item) {
                    base_items.push(item.clone());
                }
            }
        }
        (base, other) => {
            *base = other.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const BASE: &str = r#"
[paths]
records = "data/records"

[accounts.prod]
address = "https://cmk.example.com/api"
username = "automation"
limit_by_owners = ["cmdb"]
chunk_size = 200
"#;

    #[test]
    fn missing_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let resolver = ConfigResolver::new(dir.path().join("invsync.toml"));
        assert!(!resolver.has_config());
        assert!(matches!(
            resolver.resolve(),
            Err(Error::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn paths_resolve_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invsync.toml");
        fs::write(&path, BASE).unwrap();

        let config = ConfigResolver::new(&path).resolve().unwrap();
        assert_eq!(config.records_dir(), dir.path().join("data/records"));
        assert_eq!(config.rules_path(), dir.path().join("rules.toml"));
    }

    #[test]
    fn local_overrides_merge_on_top() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invsync.toml");
        fs::write(&path, BASE).unwrap();
        fs::write(
            dir.path().join("invsync.local.toml"),
            r#"
[accounts.prod]
chunk_size = 50
limit_by_owners = ["cmdb", "csv"]
"#,
        )
        .unwrap();

        let resolver = ConfigResolver::new(&path);
        assert!(resolver.has_local_overrides());

        let config = resolver.resolve().unwrap();
        let prod = &config.manifest.accounts["prod"];
        assert_eq!(prod.chunk_size, 50);
        assert_eq!(prod.username, "automation");
        assert_eq!(prod.limit_by_owners, vec!["cmdb", "csv"]);
    }

    #[test]
    fn unknown_account_is_an_error() {
        let config = ResolvedConfig::new("/tmp", Manifest::empty());
        assert!(matches!(
            config.account("nope"),
            Err(Error::UnknownAccount { ref name }) if name == "nope"
        ));
    }

    #[test]
    fn sync_id_defaults_to_account_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invsync.toml");
        fs::write(&path, BASE).unwrap();

        let account = ConfigResolver::new(&path)
            .resolve()
            .unwrap()
            .account("prod")
            .unwrap();
        assert_eq!(account.sync_id(), "prod");
        assert_eq!(account.secret, None);
    }
}
