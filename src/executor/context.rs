//! Per-execution state
//!
//! A CTE scope binds names to materialized row sets for one query and the
//! queries nested in it. Nothing here outlives a single execution.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowSet;

use super::result::ExecutionStats;

/// CTE bindings visible to a query
#[derive(Debug, Clone, Default)]
pub struct CteScope {
    tables: HashMap<String, Arc<RowSet>>,
}

impl CteScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, shadowing any base table or outer CTE of that name
    pub fn bind(&mut self, name: impl Into<String>, rows: RowSet) {
        self.tables.insert(name.into(), Arc::new(rows));
    }

    pub fn get(&self, name: &str) -> Option<Arc<RowSet>> {
        self.tables.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Execution counters; single-threaded, so plain cells
#[derive(Debug, Default)]
pub struct StatsCollector {
    pub rows_scanned: Cell<u64>,
    ctes_materialized: Cell<u64>,
    subqueries_evaluated: Cell<u64>,
}

impl StatsCollector {
    pub fn cte_materialized(&self) {
        self.ctes_materialized.set(self.ctes_materialized.get() + 1);
    }

    pub fn subquery_evaluated(&self) {
        self.subqueries_evaluated.set(self.subqueries_evaluated.get() + 1);
    }

    pub fn snapshot(&self, rows_returned: u64) -> ExecutionStats {
        ExecutionStats {
            rows_scanned: self.rows_scanned.get(),
            rows_returned,
            ctes_materialized: self.ctes_materialized.get(),
            subqueries_evaluated: self.subqueries_evaluated.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, DataType, Schema};

    #[test]
    fn test_scope_clone_is_independent() {
        let mut outer = CteScope::new();
        outer.bind("a", RowSet::empty(Schema::new(vec![Column::new("x", DataType::Int)])));

        let mut inner = outer.clone();
        inner.bind("b", RowSet::empty(Schema::empty()));

        assert!(outer.get("b").is_none());
        assert!(inner.get("a").is_some());
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = StatsCollector::default();
        stats.rows_scanned.set(5);
        stats.cte_materialized();
        stats.subquery_evaluated();
        stats.subquery_evaluated();

        let snapshot = stats.snapshot(2);
        assert_eq!(snapshot.rows_scanned, 5);
        assert_eq!(snapshot.rows_returned, 2);
        assert_eq!(snapshot.ctes_materialized, 1);
        assert_eq!(snapshot.subqueries_evaluated, 2);
    }
}
