//! Observability subsystem for storeql
//!
//! Provides:
//! - Structured logging (JSON lines on stderr)
//! - Process-wide counters
//! - Query and store lifecycle events
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on query results
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use storeql::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};
//!
//! log_event_with_fields(Event::StoreSeeded, &[("rows", "1200")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_queries_executed();
//!
//! let scope = ObservationScope::new("QUERY");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::StoreSeeded);
        log_event(Event::QueryComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::StoreLoaded, &[("fixtures_dir", "/tmp/fixtures")]);
    }
}
