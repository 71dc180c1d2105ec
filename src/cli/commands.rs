//! CLI command implementations
//!
//! Each command builds its JSON payload; `run_command` writes it. The store
//! is built once per invocation and only read afterwards.

use serde_json::{json, Value};

use crate::executor::QueryExecutor;
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry};
use crate::planner::{ExplainPlan, QueryComposer};
use crate::reports::{self, Report};
use crate::storage::{check_store, seed_store, FixtureLoader, MemoryStore};

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments, run the command, report failures as JSON
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    let result = Config::resolve(cli.config.as_deref()).and_then(|config| {
        Logger::set_min_severity(config.severity()?);
        run_command(&config, &cli.command)
    });

    if let Err(e) = &result {
        write_error(e.code_str(), e.message())?;
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(config: &Config, cmd: &Command) -> CliResult<()> {
    let data = match cmd {
        Command::Reports => list_reports(),
        Command::Run { report } => {
            let store = build_store(config)?;
            run_report(&store, report)?
        }
        Command::Explain { report } => {
            let store = build_store(config)?;
            explain_report(&store, report)?
        }
        Command::Check => {
            let store = build_store(config)?;
            check(&store)?
        }
    };
    write_response(data)
}

/// Loads fixtures when configured, otherwise generates the seeded store
pub fn build_store(config: &Config) -> CliResult<MemoryStore> {
    match &config.fixtures_dir {
        Some(dir) => {
            let store = FixtureLoader::new(dir).load()?;
            let rows = store.total_rows().to_string();
            let dir = dir.display().to_string();
            log_event_with_fields(Event::StoreLoaded, &[("dir", &dir), ("rows", &rows)]);
            Ok(store)
        }
        None => {
            let store = seed_store(config.seed_config())?;
            let rows = store.total_rows().to_string();
            let seed = config.seed.to_string();
            log_event_with_fields(Event::StoreSeeded, &[("seed", &seed), ("rows", &rows)]);
            Ok(store)
        }
    }
}

fn lookup(name: &str) -> CliResult<&'static Report> {
    reports::find(name).ok_or_else(|| CliError::unknown_report(name))
}

/// `{"reports": [{"name", "description"}, ...]}`
pub fn list_reports() -> Value {
    let list: Vec<Value> = reports::REPORTS
        .iter()
        .map(|r| json!({ "name": r.name, "description": r.description }))
        .collect();
    json!({ "reports": list })
}

/// Executes a report; the payload carries columns, rows, stats and metrics
pub fn run_report(store: &MemoryStore, name: &str) -> CliResult<Value> {
    let report = lookup(name)?;
    let metrics = MetricsRegistry::new();
    let result = QueryExecutor::new(store)
        .with_metrics(&metrics)
        .run(&report.query())?;

    let mut data = result.to_json();
    data["report"] = json!(report.name);
    data["metrics"] = serde_json::to_value(metrics.snapshot())?;
    Ok(data)
}

/// Composes a report without executing it
pub fn explain_report(store: &MemoryStore, name: &str) -> CliResult<Value> {
    let report = lookup(name)?;
    let explain = match QueryComposer::new(store).compose(&report.query()) {
        Ok(plan) => ExplainPlan::from_plan(&plan),
        Err(e) => ExplainPlan::from_error(&e),
    };

    let mut data = explain.to_json();
    data["report"] = json!(report.name);
    Ok(data)
}

/// Runs the integrity checks
pub fn check(store: &MemoryStore) -> CliResult<Value> {
    let rows = store.total_rows().to_string();
    match check_store(store) {
        Ok(()) => {
            log_event_with_fields(Event::IntegrityCheckPassed, &[("rows", &rows)]);
            Ok(json!({ "passed": true, "rows": store.total_rows() }))
        }
        Err(e) => {
            let reason = e.to_string();
            log_event_with_fields(Event::IntegrityCheckFailed, &[("reason", &reason), ("rows", &rows)]);
            Err(e.into())
        }
    }
}
