//! inventory-sync CLI
//!
//! Runs account syncs and rule traces from the command line.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: logging disabled: {}", "warning".yellow().bold(), e);
    }
    tracing::debug!(config = %cli.config.display(), "Starting");

    match cli.command {
        Some(Commands::Run {
            account,
            dry_run,
            json,
        }) => commands::run_sync(&cli.config, &account, dry_run, cli.verbose, json),
        Some(Commands::Debug { account, key, json }) => {
            commands::run_debug(&cli.config, &account, &key, json)
        }
        None => {
            println!("{} inventory-sync CLI", "invsync".green().bold());
            println!();
            println!("Run {} for available commands.", "invsync --help".cyan());
            Ok(())
        }
    }
}
