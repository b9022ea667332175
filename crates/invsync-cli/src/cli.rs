//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// inventory-sync - Push local inventory records into a monitoring system
#[derive(Parser, Debug)]
#[command(name = "invsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "INVSYNC_CONFIG", default_value = "invsync.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Synchronize records into one account
    ///
    /// Examples:
    ///   invsync run prod              # Sync the prod account
    ///   invsync run prod --dry-run    # Show what would change
    Run {
        /// Account name from the configuration
        account: String,

        /// Preview changes without writing to the remote system
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how the rules of an account treat one record
    Debug {
        /// Account name from the configuration
        account: String,

        /// Record key (host name)
        key: String,

        /// Print the trace as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run_with_dry_run() {
        let cli = Cli::try_parse_from(["invsync", "run", "prod", "--dry-run"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Run {
                account: "prod".to_string(),
                dry_run: true,
                json: false,
            })
        );
        assert_eq!(cli.config, PathBuf::from("invsync.toml"));
    }

    #[test]
    fn parse_debug_with_global_config() {
        let cli =
            Cli::try_parse_from(["invsync", "debug", "prod", "web01", "-c", "/etc/invsync.toml"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/invsync.toml"));
        assert!(matches!(cli.command, Some(Commands::Debug { key, .. }) if key == "web01"));
    }

    #[test]
    fn run_requires_account() {
        assert!(Cli::try_parse_from(["invsync", "run"]).is_err());
    }
}
