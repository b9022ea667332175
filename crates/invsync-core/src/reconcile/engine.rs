//! Reconciler: drives one account through fetch, compute, apply and cleanup

use tracing::{debug, info, warn};

use invsync_rules::{RuleSet, SeatAllocator};

use super::apply::Applier;
use super::cleanup::{candidates, cleanup};
use super::compute::compute;
use super::fetch::fetch;
use super::plan::SyncPlan;
use super::report::SyncReport;
use crate::Result;
use crate::config::Account;
use crate::pipeline::{PinChange, Pipeline, apply_bookkeeping};
use crate::remote::RemoteClient;
use crate::store::{RecordFilter, RecordStore};

/// Options for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute and report, but do not write to the remote system
    pub dry_run: bool,
    /// Log every rule evaluation
    pub debug: bool,
}

/// Synchronizes local records into the remote system for one account
pub struct Reconciler<'a> {
    account: &'a Account,
    client: &'a RemoteClient,
    records: &'a dyn RecordStore,
    rules: &'a RuleSet,
    allocator: Option<&'a dyn SeatAllocator>,
    options: RunOptions,
}

impl<'a> Reconciler<'a> {
    /// `rules` should already be [prepared](RuleSet::prepared)
    pub fn new(
        account: &'a Account,
        client: &'a RemoteClient,
        records: &'a dyn RecordStore,
        rules: &'a RuleSet,
    ) -> Self {
        Self {
            account,
            client,
            records,
            rules,
            allocator: None,
            options: RunOptions::default(),
        }
    }

    pub fn with_allocator(mut self, allocator: &'a dyn SeatAllocator) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Run all phases
    ///
    /// Always returns a report. Failures that abort the run are recorded in
    /// it; per-record and per-host failures are recorded and skipped.
    pub fn run(&self) -> SyncReport {
        let mut report = SyncReport::new(&self.account.name, self.options.dry_run);
        info!(account = %self.account.name, dry_run = self.options.dry_run, "Starting sync");

        if let Err(e) = self.run_phases(&mut report) {
            warn!(account = %self.account.name, error = %e, "Sync aborted");
            report.push_error(format!("Run aborted: {e}"));
        }
        report.finish();

        info!(
            account = %self.account.name,
            success = report.success,
            created = report.counts.created,
            updated = report.counts.updated,
            deleted = report.counts.deleted,
            "Sync finished"
        );
        report
    }

    fn run_phases(&self, report: &mut SyncReport) -> Result<()> {
        let config = &self.account.config;
        let sync_id = self.account.sync_id();

        let mut remote = fetch(self.client, config.fetch_by_folder, config.workers)?;

        let filter = RecordFilter::owners(config.limit_by_owners.iter());
        let mut records = self.records.list(&filter)?;
        report.counts.total = records.len();

        let mut pipeline = Pipeline::new(&self.account.name, self.rules)?.with_debug(self.options.debug);
        if let Some(allocator) = self.allocator {
            pipeline = pipeline.with_allocator(allocator);
        }
        let mut outcomes = compute(&records, &pipeline, config.workers)?;

        let mut plan = SyncPlan::default();
        let cache_key = pipeline.cache_key();
        for record in &mut records {
            match outcomes.remove(&record.key) {
                Some(Ok(outcome)) => {
                    let previous = record.pinned_folder.clone();
                    if apply_bookkeeping(record, &cache_key, &outcome)
                        && let Err(e) = self.records.save(record)
                    {
                        warn!(record = %record.key, error = %e, "Saving record failed");
                        report.push_error(format!("{}: saving record failed: {e}", record.key));
                        report.counts.failed += 1;
                        plan.failed.insert(record.key.clone());
                        self.restore_seat(&record.key, previous.as_deref(), &outcome.pin);
                        record.pinned_folder = previous;
                        continue;
                    }
                    plan.add(&outcome, sync_id);
                }
                Some(Err(e)) => {
                    warn!(record = %record.key, error = %e, "Record evaluation failed");
                    report.push_error(format!("{}: {e}", record.key));
                    report.counts.failed += 1;
                    plan.failed.insert(record.key.clone());
                }
                None => {}
            }
        }
        report.counts.ignored = plan.ignored.len();
        info!(
            hosts = plan.hosts.len(),
            clusters = plan.clusters.len(),
            ignored = plan.ignored.len(),
            failed = plan.failed.len(),
            "Plan computed"
        );

        let applied =
            Applier::new(self.client, config, self.options.dry_run).apply(&plan, &mut remote, report)?;

        if !self.options.dry_run {
            for record in records.iter_mut().filter(|r| applied.exported.contains(&r.key)) {
                record.touch_export();
                if let Err(e) = self.records.save(record) {
                    warn!(record = %record.key, error = %e, "Saving export time failed");
                    report.push_error(format!("{}: saving export time failed: {e}", record.key));
                }
            }
        }

        let stale = candidates(&remote, &plan, &applied, sync_id);
        cleanup(self.client, &stale, config.delete_limit, self.options.dry_run, report);
        Ok(())
    }

    /// Undo the seat changes of a record whose new pin could not be saved
    ///
    /// Seats must match the pins in the store: the seat taken for the new pin
    /// is given back and a seat in the stored pin's pool is taken again.
    fn restore_seat(&self, key: &str, previous: Option<&str>, pin: &PinChange) {
        let Some(allocator) = self.allocator else {
            return;
        };
        if let PinChange::Set(folder) = pin
            && let Err(e) = allocator.release(folder)
        {
            warn!(record = %key, folder = %folder, error = %e, "Releasing pool seat failed");
        }

        let stale = match pin {
            PinChange::Keep => None,
            PinChange::Set(_) | PinChange::Cleared => previous,
        };
        if let Some(old) = stale
            && allocator.is_pool(old)
        {
            match allocator.allocate(&[old.to_string()]) {
                Ok(Some(_)) => debug!(record = %key, folder = %old, "Pool seat taken back"),
                Ok(None) => warn!(record = %key, folder = %old, "Pool seat could not be taken back"),
                Err(e) => warn!(record = %key, folder = %old, error = %e, "Pool seat could not be taken back"),
            }
        }
    }
}
