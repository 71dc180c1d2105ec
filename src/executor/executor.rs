//! Query executor for storeql
//!
//! Executes composed plans against a table source, producing deterministic
//! results.
//!
//! Execution flow (canonical order, whatever the builder call order):
//! 1. Materialize CTEs, each exactly once, in definition order
//! 2. Scan the FROM source (table, CTE or derived table)
//! 3. Apply joins in declaration order
//! 4. Filter (WHERE)
//! 5. Group and aggregate, then HAVING
//! 6. Window functions
//! 7. Project (SELECT), DISTINCT
//! 8. Sort (ORDER BY)
//! 9. Offset / limit
//!
//! Nested queries (derived tables, scalar subqueries, EXISTS) run through the
//! same pipeline with the enclosing CTE scope and outer row in view.

use std::sync::Arc;

use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};
use crate::planner::{
    group_windows, Query, QueryComposer, QueryError, QueryPlan, QueryResult, TableRef, WindowGroup,
};
use crate::storage::TableSource;
use crate::types::RowSet;

use super::context::{CteScope, StatsCollector};
use super::expression::{EvalContext, OuterRow, SubqueryRunner};
use super::operators::{self, Relation};
use super::result::ExecutionResult;
use super::window;

/// Query executor that runs plans against a table source.
///
/// Borrows the store immutably; independent executors may share one store
/// across threads.
pub struct QueryExecutor<'a> {
    store: &'a dyn TableSource,
    metrics: Option<&'a MetricsRegistry>,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new executor
    pub fn new(store: &'a dyn TableSource) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    /// Reports counters to `metrics` after every execution
    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Composes and executes a query description
    pub fn run(&self, query: &Query) -> QueryResult<ExecutionResult> {
        let plan = match QueryComposer::new(self.store).compose(query) {
            Ok(plan) => plan,
            Err(err) => {
                log_event_with_fields(
                    Event::QueryRejected,
                    &[("code", err.code().code()), ("reason", err.message())],
                );
                if let Some(metrics) = self.metrics {
                    metrics.increment_queries_rejected();
                }
                return Err(err);
            }
        };

        let stage_count = plan.stages.len().to_string();
        log_event_with_fields(Event::QueryPlanned, &[("stages", &stage_count)]);
        self.execute(&plan)
    }

    /// Executes a query plan and returns results.
    ///
    /// This method is deterministic: same plan + same data = same results.
    /// Any error aborts the whole execution; no partial result is returned.
    pub fn execute(&self, plan: &QueryPlan) -> QueryResult<ExecutionResult> {
        let scope = ObservationScope::new("QUERY");
        let runtime = Runtime {
            store: self.store,
            stats: StatsCollector::default(),
        };

        let outcome = runtime.run_query(&plan.query, Some(&plan.window_groups), &CteScope::new(), None);

        match outcome {
            Ok(rows) => {
                let stats = runtime.stats.snapshot(rows.len() as u64);
                if let Some(metrics) = self.metrics {
                    metrics.increment_queries_executed();
                    metrics.add_rows_scanned(stats.rows_scanned);
                    metrics.add_rows_returned(stats.rows_returned);
                    metrics.add_ctes_materialized(stats.ctes_materialized);
                    metrics.add_subqueries_evaluated(stats.subqueries_evaluated);
                }
                scope.complete_with_fields(&[
                    ("rows_returned", &stats.rows_returned.to_string()),
                    ("rows_scanned", &stats.rows_scanned.to_string()),
                ]);
                Ok(ExecutionResult { rows, stats })
            }
            Err(err) => {
                if let Some(metrics) = self.metrics {
                    metrics.increment_queries_failed();
                }
                scope.fail(&err.to_string());
                Err(err)
            }
        }
    }
}

/// State of one execution
struct Runtime<'s> {
    store: &'s dyn TableSource,
    stats: StatsCollector,
}

/// Subquery runner for one query level: nested queries see its CTE scope
struct Level<'r, 's> {
    runtime: &'r Runtime<'s>,
    scope: &'r CteScope,
}

impl SubqueryRunner for Level<'_, '_> {
    fn run_subquery(&self, query: &Query, outer: &OuterRow) -> QueryResult<RowSet> {
        self.runtime.stats.subquery_evaluated();
        self.runtime.run_query(query, None, self.scope, Some(outer))
    }
}

impl<'s> Runtime<'s> {
    /// Runs one query to completion.
    ///
    /// `windows` carries precomputed window groups for the top-level plan;
    /// nested queries group their windows here.
    fn run_query(
        &self,
        query: &Query,
        windows: Option<&[WindowGroup]>,
        parent: &CteScope,
        outer: Option<&OuterRow>,
    ) -> QueryResult<RowSet> {
        let owned;
        let scope = if query.ctes.is_empty() {
            parent
        } else {
            owned = self.materialize_ctes(query, parent, outer)?;
            &owned
        };

        let grouped;
        let windows = match windows {
            Some(groups) => groups,
            None => {
                grouped = group_windows(query);
                grouped.as_slice()
            }
        };

        let level = Level {
            runtime: self,
            scope,
        };
        let ctx = EvalContext {
            runner: &level,
            outer,
        };
        let relation = self.pipeline(query, windows, scope, ctx)?;
        let rows = relation.into_row_set();
        rows
    }

    /// Evaluates each CTE once; later CTEs see earlier ones
    fn materialize_ctes(&self, query: &Query, parent: &CteScope, outer: Option<&OuterRow>) -> QueryResult<CteScope> {
        let mut scope = parent.clone();
        for cte in &query.ctes {
            let rows = self.run_query(&cte.query, None, &scope, outer)?;
            self.stats.cte_materialized();
            log_event_with_fields(
                Event::CteMaterialized,
                &[("cte", &cte.name), ("rows", &rows.len().to_string())],
            );
            scope.bind(cte.name.clone(), rows);
        }
        Ok(scope)
    }

    fn pipeline<'q>(
        &'q self,
        query: &'q Query,
        windows: &'q [WindowGroup],
        scope: &'q CteScope,
        ctx: EvalContext<'q>,
    ) -> QueryResult<Relation<'q>> {
        let mut relation = self.source(&query.from, scope, ctx)?;

        for join in &query.joins {
            let right = self.source(&join.table, scope, ctx)?;
            relation = operators::join(relation, right, join.kind, &join.on, ctx)?;
        }

        if let Some(predicate) = &query.filter {
            relation = operators::filter(relation, predicate, ctx)?;
        }

        if query.is_aggregate() {
            relation = operators::group_aggregate(
                relation,
                &query.group_by,
                &query.aggregates,
                query.having.as_ref(),
                ctx,
            )?;
        } else if let Some(predicate) = &query.having {
            relation = operators::filter(relation, predicate, ctx)?;
        }

        if !query.windows.is_empty() {
            relation = window::apply_windows(relation, windows, &query.windows, ctx)?;
        }

        let projected = operators::project(relation, &query.select, &query.order_by, ctx)?;
        let width = projected.width;
        let mut relation = projected.relation;

        if query.distinct {
            relation = operators::distinct(relation, width);
        }

        if !query.order_by.is_empty() {
            let directions = query.order_by.iter().map(|k| k.direction).collect();
            relation = operators::order_by(relation, width, directions)?;
        }

        relation = operators::truncate(relation, width);

        if query.limit.is_some() || query.offset.is_some() {
            let limit = query.limit.map(non_negative).transpose()?;
            let offset = non_negative(query.offset.unwrap_or(0))?;
            relation = operators::limit(relation, limit, offset);
        }

        Ok(relation)
    }

    /// Resolves a FROM/JOIN source: CTE first, then base table, or a
    /// derived table evaluated in the current scope
    fn source<'q>(
        &'q self,
        source: &'q TableRef,
        scope: &'q CteScope,
        ctx: EvalContext<'q>,
    ) -> QueryResult<Relation<'q>> {
        match source {
            TableRef::Table { name, alias } => {
                let rows = match scope.get(name) {
                    Some(rows) => rows,
                    None => Arc::new(self.store.scan(name)?),
                };
                Ok(operators::scan(rows, alias, &self.stats.rows_scanned))
            }
            TableRef::Subquery { query, alias } => {
                let rows = self.run_query(query, None, scope, ctx.outer)?;
                Ok(operators::scan(Arc::new(rows), alias, &self.stats.rows_scanned))
            }
        }
    }
}

fn non_negative(n: i64) -> QueryResult<usize> {
    usize::try_from(n).map_err(|_| QueryError::invalid_argument(format!("negative limit or offset {}", n)))
}

/// Composes and executes `query` against `store` without metrics
pub fn execute_query(store: &dyn TableSource, query: &Query) -> QueryResult<ExecutionResult> {
    QueryExecutor::new(store).run(query)
}
