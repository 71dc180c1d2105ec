//! Result types for query execution

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::types::RowSet;

/// Counters collected while one query ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    /// Rows pulled from tables, CTEs and derived tables
    pub rows_scanned: u64,
    /// Rows in the final result
    pub rows_returned: u64,
    pub ctes_materialized: u64,
    /// Nested query evaluations (once per outer row when correlated)
    pub subqueries_evaluated: u64,
}

/// Result of query execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Rows in result order
    pub rows: RowSet,
    pub stats: ExecutionStats,
}

impl ExecutionResult {
    /// Returns true if no rows matched
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of result rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `{"columns": [...], "rows": [...], "stats": {...}}`
    pub fn to_json(&self) -> JsonValue {
        let mut value = self.rows.to_json();
        value["stats"] = json!(self.stats);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, DataType, Row, Schema, Value};

    #[test]
    fn test_execution_result_empty() {
        let result = ExecutionResult {
            rows: RowSet::empty(Schema::new(vec![Column::new("id", DataType::Int)])),
            stats: ExecutionStats::default(),
        };
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
    }

    #[test]
    fn test_execution_result_json() {
        let result = ExecutionResult {
            rows: RowSet::new(
                Schema::new(vec![Column::new("id", DataType::Int)]),
                vec![Row::new(vec![Value::Int(4)])],
            ),
            stats: ExecutionStats {
                rows_scanned: 9,
                rows_returned: 1,
                ..Default::default()
            },
        };
        let json = result.to_json();
        assert_eq!(json["columns"][0], "id");
        assert_eq!(json["rows"][0][0], 4);
        assert_eq!(json["stats"]["rows_scanned"], 9);
    }
}
