//! Query error types
//!
//! Error codes:
//! - STOREQL_UNKNOWN_TABLE (COMPOSITION)
//! - STOREQL_UNKNOWN_COLUMN (COMPOSITION)
//! - STOREQL_AMBIGUOUS_COLUMN (COMPOSITION)
//! - STOREQL_CYCLIC_REFERENCE (COMPOSITION)
//! - STOREQL_TYPE_MISMATCH (EXECUTION)
//! - STOREQL_DIVISION_BY_ZERO (EXECUTION)
//! - STOREQL_INVALID_ARGUMENT (EXECUTION)
//! - STOREQL_SCALAR_SUBQUERY_CARDINALITY (EXECUTION)
//! - STOREQL_STORAGE_FAILURE (EXECUTION)
//!
//! Composition errors describe a malformed query description. Execution
//! errors abort the running pipeline. Neither is retried.

use std::fmt;

use crate::storage::StoreError;

/// Where in the query lifecycle an error class belongs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    /// Query description is malformed
    Composition,
    /// Pipeline aborted while processing rows
    Execution,
}

impl fmt::Display for QueryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPhase::Composition => write!(f, "COMPOSITION"),
            QueryPhase::Execution => write!(f, "EXECUTION"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorCode {
    /// Table or CTE name not defined
    StoreqlUnknownTable,
    /// Column absent from the input schema
    StoreqlUnknownColumn,
    /// Unqualified column matches more than one column
    StoreqlAmbiguousColumn,
    /// CTE references itself or a later CTE
    StoreqlCyclicReference,
    /// Operand types are incompatible
    StoreqlTypeMismatch,
    /// Division or modulo by zero
    StoreqlDivisionByZero,
    /// Out-of-range argument (percentile, limit, offset, ...)
    StoreqlInvalidArgument,
    /// Scalar subquery produced more than one row or column
    StoreqlScalarSubqueryCardinality,
    /// Row store failed to serve a scan
    StoreqlStorageFailure,
}

impl QueryErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            QueryErrorCode::StoreqlUnknownTable => "STOREQL_UNKNOWN_TABLE",
            QueryErrorCode::StoreqlUnknownColumn => "STOREQL_UNKNOWN_COLUMN",
            QueryErrorCode::StoreqlAmbiguousColumn => "STOREQL_AMBIGUOUS_COLUMN",
            QueryErrorCode::StoreqlCyclicReference => "STOREQL_CYCLIC_REFERENCE",
            QueryErrorCode::StoreqlTypeMismatch => "STOREQL_TYPE_MISMATCH",
            QueryErrorCode::StoreqlDivisionByZero => "STOREQL_DIVISION_BY_ZERO",
            QueryErrorCode::StoreqlInvalidArgument => "STOREQL_INVALID_ARGUMENT",
            QueryErrorCode::StoreqlScalarSubqueryCardinality => {
                "STOREQL_SCALAR_SUBQUERY_CARDINALITY"
            }
            QueryErrorCode::StoreqlStorageFailure => "STOREQL_STORAGE_FAILURE",
        }
    }

    /// Returns the phase this error class belongs to
    pub fn phase(&self) -> QueryPhase {
        match self {
            QueryErrorCode::StoreqlUnknownTable
            | QueryErrorCode::StoreqlUnknownColumn
            | QueryErrorCode::StoreqlAmbiguousColumn
            | QueryErrorCode::StoreqlCyclicReference => QueryPhase::Composition,
            QueryErrorCode::StoreqlTypeMismatch
            | QueryErrorCode::StoreqlDivisionByZero
            | QueryErrorCode::StoreqlInvalidArgument
            | QueryErrorCode::StoreqlScalarSubqueryCardinality
            | QueryErrorCode::StoreqlStorageFailure => QueryPhase::Execution,
        }
    }
}

impl fmt::Display for QueryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Query error with code and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    code: QueryErrorCode,
    message: String,
}

impl QueryError {
    fn new(code: QueryErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unknown_table(name: impl Into<String>) -> Self {
        Self::new(
            QueryErrorCode::StoreqlUnknownTable,
            format!("Unknown table '{}'", name.into()),
        )
    }

    pub fn unknown_column(name: impl Into<String>) -> Self {
        Self::new(
            QueryErrorCode::StoreqlUnknownColumn,
            format!("Unknown column '{}'", name.into()),
        )
    }

    pub fn ambiguous_column(name: impl Into<String>) -> Self {
        Self::new(
            QueryErrorCode::StoreqlAmbiguousColumn,
            format!("Column '{}' is ambiguous; qualify it with a table alias", name.into()),
        )
    }

    /// A CTE refers to itself or to a CTE defined after it
    pub fn cyclic_reference(cte: impl Into<String>, referenced: impl Into<String>) -> Self {
        Self::new(
            QueryErrorCode::StoreqlCyclicReference,
            format!(
                "CTE '{}' references '{}', which is not defined before it",
                cte.into(),
                referenced.into()
            ),
        )
    }

    pub fn type_mismatch(reason: impl Into<String>) -> Self {
        Self::new(QueryErrorCode::StoreqlTypeMismatch, reason)
    }

    pub fn division_by_zero() -> Self {
        Self::new(QueryErrorCode::StoreqlDivisionByZero, "Division by zero")
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::new(QueryErrorCode::StoreqlInvalidArgument, reason)
    }

    pub fn scalar_subquery_cardinality(rows: usize, columns: usize) -> Self {
        Self::new(
            QueryErrorCode::StoreqlScalarSubqueryCardinality,
            format!(
                "Scalar subquery must return at most one row with one column, got {} row(s) with {} column(s)",
                rows, columns
            ),
        )
    }

    pub fn storage_failure(reason: impl Into<String>) -> Self {
        Self::new(QueryErrorCode::StoreqlStorageFailure, reason)
    }

    pub fn code(&self) -> QueryErrorCode {
        self.code
    }

    pub fn phase(&self) -> QueryPhase {
        self.code.phase()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.phase(), self.code.code(), self.message)
    }
}

impl std::error::Error for QueryError {}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownTable(name) => QueryError::unknown_table(name),
            other => QueryError::storage_failure(other.to_string()),
        }
    }
}

/// Result type for query composition and execution
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            QueryErrorCode::StoreqlUnknownTable.code(),
            "STOREQL_UNKNOWN_TABLE"
        );
        assert_eq!(
            QueryErrorCode::StoreqlScalarSubqueryCardinality.code(),
            "STOREQL_SCALAR_SUBQUERY_CARDINALITY"
        );
        assert_eq!(
            QueryErrorCode::StoreqlDivisionByZero.code(),
            "STOREQL_DIVISION_BY_ZERO"
        );
    }

    #[test]
    fn test_phase_mapping() {
        assert_eq!(QueryError::cyclic_reference("a", "b").phase(), QueryPhase::Composition);
        assert_eq!(QueryError::unknown_column("x").phase(), QueryPhase::Composition);
        assert_eq!(QueryError::division_by_zero().phase(), QueryPhase::Execution);
        assert_eq!(QueryError::invalid_argument("p").phase(), QueryPhase::Execution);
    }

    #[test]
    fn test_error_display() {
        let display = QueryError::unknown_table("ordrs").to_string();
        assert_eq!(
            display,
            "[COMPOSITION] STOREQL_UNKNOWN_TABLE: Unknown table 'ordrs'"
        );
    }

    #[test]
    fn test_from_store_error() {
        let err: QueryError = StoreError::UnknownTable("t".into()).into();
        assert_eq!(err.code(), QueryErrorCode::StoreqlUnknownTable);

        let err: QueryError = StoreError::fixture_io("x.json", "denied").into();
        assert_eq!(err.code(), QueryErrorCode::StoreqlStorageFailure);
    }
}
