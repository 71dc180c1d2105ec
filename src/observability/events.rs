//! Observable events for storeql
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Store lifecycle
    /// Store loaded from fixtures
    StoreLoaded,
    /// Store generated from a seed
    StoreSeeded,
    /// Integrity checks passed
    IntegrityCheckPassed,
    /// Integrity checks found a violation
    IntegrityCheckFailed,

    // Query lifecycle
    /// Query description composed into a plan
    QueryPlanned,
    /// Query description rejected at composition
    QueryRejected,
    /// Execution started
    QueryStart,
    /// Execution finished with a result
    QueryComplete,
    /// Execution aborted with an error
    QueryFailed,
    /// A CTE was materialized
    CteMaterialized,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreLoaded => "STORE_LOADED",
            Event::StoreSeeded => "STORE_SEEDED",
            Event::IntegrityCheckPassed => "INTEGRITY_CHECK_PASSED",
            Event::IntegrityCheckFailed => "INTEGRITY_CHECK_FAILED",
            Event::QueryPlanned => "QUERY_PLANNED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::QueryStart => "QUERY_BEGIN",
            Event::QueryComplete => "QUERY_COMPLETE",
            Event::QueryFailed => "QUERY_FAILED",
            Event::CteMaterialized => "CTE_MATERIALIZED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryFailed | Event::IntegrityCheckFailed => Severity::Error,
            Event::QueryRejected => Severity::Warn,
            Event::CteMaterialized => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::StoreLoaded,
            Event::StoreSeeded,
            Event::IntegrityCheckPassed,
            Event::IntegrityCheckFailed,
            Event::QueryPlanned,
            Event::QueryRejected,
            Event::QueryStart,
            Event::QueryComplete,
            Event::QueryFailed,
            Event::CteMaterialized,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failure_events_are_errors() {
        assert_eq!(Event::QueryFailed.severity(), Severity::Error);
        assert_eq!(Event::IntegrityCheckFailed.severity(), Severity::Error);
        assert_eq!(Event::QueryComplete.severity(), Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::QueryStart), "QUERY_BEGIN");
    }
}
