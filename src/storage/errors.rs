//! Storage error types
//!
//! Error codes:
//! - STOREQL_STORE_UNKNOWN_TABLE
//! - STOREQL_STORE_FIXTURE_IO
//! - STOREQL_STORE_FIXTURE_MALFORMED
//! - STOREQL_STORE_INTEGRITY_VIOLATION

use thiserror::Error;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Row store and data loading errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Table name not registered in the store
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Fixture file could not be read
    #[error("Failed to read fixture {path}: {reason}")]
    FixtureIo { path: String, reason: String },

    /// Fixture file content does not match the table schema
    #[error("Malformed fixture {path}: {reason}")]
    FixtureMalformed { path: String, reason: String },

    /// Loaded data violates a catalog invariant
    #[error("Integrity violation in {table}: {reason}")]
    IntegrityViolation { table: String, reason: String },
}

impl StoreError {
    pub fn fixture_io(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::FixtureIo {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn fixture_malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::FixtureMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn integrity(table: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::IntegrityViolation {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Returns the string code for this error
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::UnknownTable(_) => "STOREQL_STORE_UNKNOWN_TABLE",
            StoreError::FixtureIo { .. } => "STOREQL_STORE_FIXTURE_IO",
            StoreError::FixtureMalformed { .. } => "STOREQL_STORE_FIXTURE_MALFORMED",
            StoreError::IntegrityViolation { .. } => "STOREQL_STORE_INTEGRITY_VIOLATION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            StoreError::UnknownTable("x".into()).code(),
            "STOREQL_STORE_UNKNOWN_TABLE"
        );
        assert_eq!(
            StoreError::integrity("orders", "bad").code(),
            "STOREQL_STORE_INTEGRITY_VIOLATION"
        );
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::fixture_malformed("users.json", "expected array");
        let display = err.to_string();
        assert!(display.contains("users.json"));
        assert!(display.contains("expected array"));
    }
}
