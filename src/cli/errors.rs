//! CLI-specific error types
//!
//! Every CLI error is fatal for the invocation: it is printed as a JSON error
//! document and the process exits non-zero.

use std::fmt;
use std::io;

use crate::planner::{QueryError, QueryErrorCode};
use crate::storage::StoreError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout, config file)
    IoError,
    /// Report name not in the catalog
    UnknownReport,
    /// Store could not be loaded or failed its integrity checks
    StoreError,
    /// Query composition or execution failed
    Query(QueryErrorCode),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "STOREQL_CLI_CONFIG_ERROR",
            Self::IoError => "STOREQL_CLI_IO_ERROR",
            Self::UnknownReport => "STOREQL_CLI_UNKNOWN_REPORT",
            Self::StoreError => "STOREQL_CLI_STORE_ERROR",
            Self::Query(code) => code.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn unknown_report(name: &str) -> Self {
        Self::new(
            CliErrorCode::UnknownReport,
            format!("Unknown report '{}'. Run 'storeql reports' for the list.", name),
        )
    }

    /// Get the error code
    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        Self::new(CliErrorCode::Query(e.code()), e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::new(CliErrorCode::StoreError, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_keeps_engine_code() {
        let err: CliError = QueryError::unknown_table("ghosts").into();
        assert_eq!(err.code_str(), "STOREQL_UNKNOWN_TABLE");
        assert!(err.message().contains("ghosts"));
    }

    #[test]
    fn test_store_error_code() {
        let err: CliError = StoreError::UnknownTable("x".into()).into();
        assert_eq!(err.code(), CliErrorCode::StoreError);
        assert_eq!(err.code_str(), "STOREQL_CLI_STORE_ERROR");
    }

    #[test]
    fn test_display() {
        let err = CliError::unknown_report("nope");
        assert!(err.to_string().starts_with("STOREQL_CLI_UNKNOWN_REPORT: "));
    }
}
