//! Structured result of one sync run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Records considered for this account
    pub total: usize,
    pub ignored: usize,
    pub failed: usize,
    pub folders_created: usize,
    pub clusters_created: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Info,
    Warning,
    Error,
}

/// A noteworthy event that is not an error of the run itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    pub level: DetailLevel,
    pub message: String,
}

/// Report from a sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub account: String,
    /// Whether the run finished without errors
    pub success: bool,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counts: SyncCounts,
    /// Actions taken (or, in a dry run, that would be taken)
    pub actions: Vec<String>,
    pub errors: Vec<String>,
    pub details: Vec<Detail>,
}

impl SyncReport {
    pub fn new(account: impl Into<String>, dry_run: bool) -> Self {
        Self {
            account: account.into(),
            success: true,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            counts: SyncCounts::default(),
            actions: Vec::new(),
            errors: Vec::new(),
            details: Vec::new(),
        }
    }

    /// Add an action to the report
    pub fn with_action(mut self, action: String) -> Self {
        self.push_action(action);
        self
    }

    /// Record an action, prefixed in dry runs
    pub fn push_action(&mut self, action: impl Into<String>) {
        let action = action.into();
        if self.dry_run {
            self.actions.push(format!("[dry-run] Would {action}"));
        } else {
            self.actions.push(action);
        }
    }

    /// Record an error; the run is no longer successful
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.success = false;
        self.errors.push(error.into());
    }

    pub fn detail(&mut self, level: DetailLevel, message: impl Into<String>) {
        self.details.push(Detail {
            level,
            message: message.into(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_mark_failure() {
        let mut report = SyncReport::new("prod", false);
        assert!(report.success);
        report.push_error("boom");
        assert!(!report.success);
    }

    #[test]
    fn dry_run_prefixes_actions() {
        let report = SyncReport::new("prod", true).with_action("create host web01".to_string());
        assert_eq!(report.actions, vec!["[dry-run] Would create host web01"]);
    }

    #[test]
    fn details_do_not_fail_the_run() {
        let mut report = SyncReport::new("prod", false);
        report.detail(DetailLevel::Error, "too many deletions");
        assert!(report.success);
        assert_eq!(report.details[0].level, DetailLevel::Error);
    }
}
