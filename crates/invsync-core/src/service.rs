//! File-backed entry point used by the CLI
//!
//! Wires the configured record directory, rule file and pool file to a
//! [`Reconciler`] for one account.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use invsync_rules::{RuleSet, RuleSource, TomlRuleSource};

use crate::config::{ConfigResolver, ResolvedConfig};
use crate::pipeline::{Pipeline, RecordDebug};
use crate::pool::{FolderPoolAllocator, TomlPoolStore};
use crate::reconcile::{Reconciler, RunOptions, SyncReport};
use crate::remote::{HttpTransport, RemoteClient, Transport};
use crate::store::{FileRecordStore, RecordStore};
use crate::{Error, Result};

pub struct SyncService {
    config: ResolvedConfig,
}

impl SyncService {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    /// Resolve the manifest at `path` plus its local overlay
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = ConfigResolver::new(path.as_ref()).resolve()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    fn rules(&self) -> Result<RuleSet> {
        let path = self.config.rules_path();
        debug!(path = %path.display(), "Loading rules");
        Ok(TomlRuleSource::new(path).load()?.prepared())
    }

    /// Sync one account over HTTP
    pub fn run(&self, account: &str, options: RunOptions) -> Result<SyncReport> {
        let resolved = self.config.account(account)?;
        let transport = HttpTransport::new(&resolved)?;
        self.run_with(account, Arc::new(transport), options)
    }

    /// Sync one account over `transport`
    ///
    /// Only setup errors are returned. Once the run starts, failures end up
    /// in the report.
    pub fn run_with(
        &self,
        account: &str,
        transport: Arc<dyn Transport>,
        options: RunOptions,
    ) -> Result<SyncReport> {
        let account = self.config.account(account)?;
        let records = FileRecordStore::new(self.config.records_dir())?;
        let rules = self.rules()?;
        let allocator = FolderPoolAllocator::new(TomlPoolStore::new(self.config.pools_path()))?;
        let client = RemoteClient::new(transport);

        let report = Reconciler::new(&account, &client, &records, &rules)
            .with_allocator(&allocator)
            .with_options(options)
            .run();
        Ok(report)
    }

    /// Trace one record through the account's rules
    ///
    /// Pool seats are previewed, not taken.
    pub fn debug_record(&self, account: &str, key: &str) -> Result<RecordDebug> {
        let account = self.config.account(account)?;
        let records = FileRecordStore::new(self.config.records_dir())?;
        let record = records.get(key)?.ok_or_else(|| Error::RecordNotFound {
            key: key.to_string(),
        })?;
        let rules = self.rules()?;
        let allocator = FolderPoolAllocator::new(TomlPoolStore::new(self.config.pools_path()))?;

        Pipeline::new(&account.name, &rules)?
            .with_allocator(&allocator)
            .debug_record(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Manifest;
    use tempfile::TempDir;

    #[test]
    fn debug_record_reports_missing_record() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::parse(
            r#"
[accounts.prod]
address = "https://monitor.example.com/site/check_mk/api/1.0"
"#,
        )
        .unwrap();
        let service = SyncService::new(ResolvedConfig::new(dir.path(), manifest));

        let err = service.debug_record("prod", "nope").unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { key } if key == "nope"));
    }

    #[test]
    fn unknown_account_is_rejected() {
        let dir = TempDir::new().unwrap();
        let service = SyncService::new(ResolvedConfig::new(dir.path(), Manifest::empty()));
        assert!(matches!(
            service.debug_record("ghost", "web01"),
            Err(Error::UnknownAccount { .. })
        ));
    }
}
