//! The run command

use std::path::Path;

use colored::Colorize;

use invsync_core::reconcile::DetailLevel;
use invsync_core::{RunOptions, SyncReport, SyncService};

use crate::error::{CliError, Result};

/// Sync one account and print its report
///
/// Fails when the report carries errors, after printing it. `verbose` also
/// traces every rule evaluation.
pub fn run_sync(
    config: &Path,
    account: &str,
    dry_run: bool,
    verbose: bool,
    json: bool,
) -> Result<()> {
    let service = SyncService::from_path(config)?;

    if !json {
        let what = if dry_run { "Previewing sync" } else { "Syncing" };
        println!("{} {} account {}...", "=>".blue().bold(), what, account.cyan());
    }

    let report = service.run(account, run_options(dry_run, verbose))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.success {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "sync of {} finished with {} error(s)",
            account,
            report.errors.len()
        )))
    }
}

fn run_options(dry_run: bool, verbose: bool) -> RunOptions {
    RunOptions {
        dry_run,
        debug: verbose,
    }
}

fn print_report(report: &SyncReport) {
    for action in &report.actions {
        println!("   {} {}", "+".green(), action);
    }
    for detail in &report.details {
        let marker = match detail.level {
            DetailLevel::Info => "i".dimmed(),
            DetailLevel::Warning => "!".yellow(),
            DetailLevel::Error => "!".red(),
        };
        println!("   {} {}", marker, detail.message);
    }
    for error in &report.errors {
        println!("   {} {}", "x".red(), error);
    }

    let counts = &report.counts;
    let status = if report.success {
        "OK".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "{} {} records: {} created, {} updated, {} deleted, {} ignored, {} failed",
        status,
        counts.total,
        counts.created,
        counts.updated,
        counts.deleted,
        counts.ignored,
        counts.failed
    );
    if report.dry_run {
        println!("{}", "Dry run, nothing was written.".dimmed());
    }
}
