//! CLI argument definitions using clap
//!
//! Commands:
//! - storeql [--config <path>] reports
//! - storeql [--config <path>] run <report>
//! - storeql [--config <path>] explain <report>
//! - storeql [--config <path>] check

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// storeql - analytical reports over an in-memory e-commerce store
#[derive(Parser, Debug)]
#[command(name = "storeql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file; all defaults when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the report catalog
    Reports,

    /// Execute a report and print its rows
    Run {
        /// Report name as listed by `reports`
        report: String,
    },

    /// Print the composed stage pipeline of a report
    Explain {
        /// Report name as listed by `reports`
        report: String,
    },

    /// Run integrity checks on the store
    Check,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_config() {
        let cli = Cli::try_parse_from(["storeql", "--config", "store.json", "run", "top_spenders"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("store.json")));
        assert_eq!(
            cli.command,
            Command::Run {
                report: "top_spenders".to_string()
            }
        );
    }

    #[test]
    fn test_config_is_optional() {
        let cli = Cli::try_parse_from(["storeql", "check"]).unwrap();
        assert!(cli.config.is_none());
        assert_eq!(cli.command, Command::Check);
    }

    #[test]
    fn test_run_requires_report() {
        assert!(Cli::try_parse_from(["storeql", "run"]).is_err());
    }
}
