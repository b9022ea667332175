//! The debug command

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;

use invsync_core::SyncService;

use crate::error::Result;

/// Trace one record through an account's rules
pub fn run_debug(config: &Path, account: &str, key: &str, json: bool) -> Result<()> {
    let service = SyncService::from_path(config)?;
    let debug = service.debug_record(account, key)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&debug)?);
        return Ok(());
    }

    println!("{} Record {} for account {}", "=>".blue().bold(), key.cyan(), account.cyan());
    print_attributes("Original attributes", &debug.original_attributes);
    print_attributes("Exported attributes", &debug.attributes);
    if debug.ignore {
        println!("{} Record is ignored by a filter rule", "!".yellow().bold());
    }

    for (kind, traces) in [
        ("Filter", &debug.filter),
        ("Rewrite", &debug.rewrite),
        ("Action", &debug.action),
    ] {
        println!();
        println!("{}", format!("{kind} rules").bold());
        if traces.is_empty() {
            println!("   {}", "(none)".dimmed());
        }
        for trace in traces {
            let marker = if trace.hit { "+".green() } else { "-".dimmed() };
            let mut line = format!("   {} {} ({})", marker, trace.name, trace.id.dimmed());
            if trace.hit && trace.last_match {
                line.push_str(&format!(" {}", "[last match]".yellow()));
            }
            if let Some(error) = &trace.error {
                line.push_str(&format!(" {} {}", "error:".red(), error));
            }
            println!("{line}");
        }
    }

    println!();
    println!("{}", "Outcome".bold());
    println!("{}", serde_json::to_string_pretty(&debug.outcome)?);
    Ok(())
}

fn print_attributes(title: &str, attributes: &BTreeMap<String, String>) {
    println!("{}", title.bold());
    if attributes.is_empty() {
        println!("   {}", "(none)".dimmed());
    }
    for (name, value) in attributes {
        println!("   {} = {}", name.cyan(), value);
    }
}
