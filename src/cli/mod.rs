//! CLI module for storeql
//!
//! Provides command-line interface for:
//! - reports: List the report catalog
//! - run: Execute one report
//! - explain: Show the composed pipeline of a report
//! - check: Verify store integrity

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{build_store, check, explain_report, list_reports, run, run_command, run_report};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{error_document, success_document, write_error, write_response};
