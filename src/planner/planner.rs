//! Query pipeline composer
//!
//! Validates a query description and fixes its stage order. Whatever order
//! the builder was called in, the pipeline is always:
//!
//! 1. Materialize CTEs (definition order)
//! 2. Scan FROM source
//! 3. Joins (declaration order)
//! 4. Filter (WHERE)
//! 5. Aggregate (GROUP BY + aggregates)
//! 6. Having
//! 7. Window (one stage per distinct window specification)
//! 8. Project (SELECT)
//! 9. Distinct
//! 10. Sort (ORDER BY)
//! 11. Limit / offset
//!
//! Name resolution of tables and CTEs, CTE cycle detection and argument range
//! checks happen here, before any row is read.

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::storage::TableSource;

use super::ast::{AggregateFunc, Expr, JoinKind, Query, TableRef, WindowFunction, WindowSpec};
use super::errors::{QueryError, QueryResult};

/// One step of the composed pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    MaterializeCtes { names: Vec<String> },
    Scan { source: String },
    Join { kind: JoinKind, source: String, on: String },
    Filter { predicate: String },
    Aggregate { keys: Vec<String>, aggregates: Vec<String> },
    Having { predicate: String },
    Window { spec: String, functions: Vec<String> },
    Project { columns: Vec<String> },
    Distinct,
    Sort { keys: Vec<String> },
    Limit { limit: Option<i64>, offset: i64 },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::MaterializeCtes { .. } => "CTE",
            Stage::Scan { .. } => "SCAN",
            Stage::Join { .. } => "JOIN",
            Stage::Filter { .. } => "FILTER",
            Stage::Aggregate { .. } => "AGGREGATE",
            Stage::Having { .. } => "HAVING",
            Stage::Window { .. } => "WINDOW",
            Stage::Project { .. } => "PROJECT",
            Stage::Distinct => "DISTINCT",
            Stage::Sort { .. } => "SORT",
            Stage::Limit { .. } => "LIMIT",
        }
    }
}

/// Window calls sharing one specification, evaluated with a single
/// partition + sort pass
#[derive(Debug, Clone, PartialEq)]
pub struct WindowGroup {
    pub spec: WindowSpec,
    /// Indexes into `Query::windows`
    pub calls: Vec<usize>,
}

/// Immutable, validated query plan
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub query: Query,
    pub stages: Vec<Stage>,
    pub window_groups: Vec<WindowGroup>,
}

/// Groups window calls by equal specification, first appearance first
pub fn group_windows(query: &Query) -> Vec<WindowGroup> {
    let mut groups: Vec<WindowGroup> = Vec::new();
    for (index, call) in query.windows.iter().enumerate() {
        match groups.iter_mut().find(|g| g.spec == call.spec) {
            Some(group) => group.calls.push(index),
            None => groups.push(WindowGroup {
                spec: call.spec.clone(),
                calls: vec![index],
            }),
        }
    }
    groups
}

/// Composes query descriptions into plans
pub struct QueryComposer<'a> {
    tables: &'a dyn TableSource,
}

impl<'a> QueryComposer<'a> {
    pub fn new(tables: &'a dyn TableSource) -> Self {
        Self { tables }
    }

    /// Validates the query and produces its plan.
    ///
    /// Deterministic: same query and same table set give the same plan.
    pub fn compose(&self, query: &Query) -> QueryResult<QueryPlan> {
        self.validate(query, &[])?;

        Ok(QueryPlan {
            query: query.clone(),
            stages: stages(query),
            window_groups: group_windows(query),
        })
    }

    /// Validates `query` with `visible` CTE names in scope (outer first)
    fn validate(&self, query: &Query, visible: &[&str]) -> QueryResult<()> {
        let mut scope: Vec<&str> = visible.to_vec();
        let mut declared = HashSet::new();

        for (i, cte) in query.ctes.iter().enumerate() {
            if !declared.insert(cte.name.as_str()) {
                return Err(QueryError::invalid_argument(format!(
                    "CTE '{}' is defined more than once",
                    cte.name
                )));
            }

            let later: Vec<&str> = query.ctes[i..].iter().map(|c| c.name.as_str()).collect();
            self.check_cycles(&cte.name, &cte.query, &scope, &later)?;
            self.validate(&cte.query, &scope)?;
            scope.push(&cte.name);
        }

        self.validate_body(query, &scope)
    }

    /// A CTE body may only reference CTEs defined before it. Names of the
    /// CTE itself or later siblings are cycles unless an earlier definition
    /// or an outer scope already provides them.
    fn check_cycles(&self, cte: &str, body: &Query, scope: &[&str], later: &[&str]) -> QueryResult<()> {
        let mut result = Ok(());
        visit_table_names(body, &mut |name| {
            if result.is_err() {
                return;
            }
            if later.contains(&name) && !scope.contains(&name) {
                result = Err(QueryError::cyclic_reference(cte, name));
            }
        });
        result
    }

    fn validate_body(&self, query: &Query, scope: &[&str]) -> QueryResult<()> {
        self.validate_source(&query.from, scope)?;
        for join in &query.joins {
            self.validate_source(&join.table, scope)?;
        }

        let mut result = Ok(());
        query.for_each_subquery(&mut |sub| {
            if result.is_ok() && !is_derived_table(query, sub) {
                result = self.validate(sub, scope);
            }
        });
        result?;

        if let Some(limit) = query.limit {
            if limit < 0 {
                return Err(QueryError::invalid_argument(format!(
                    "LIMIT must not be negative, got {}",
                    limit
                )));
            }
        }
        if let Some(offset) = query.offset {
            if offset < 0 {
                return Err(QueryError::invalid_argument(format!(
                    "OFFSET must not be negative, got {}",
                    offset
                )));
            }
        }

        for spec in &query.aggregates {
            check_aggregate_func(spec.call.func)?;
        }
        for window in &query.windows {
            if let WindowFunction::Aggregate(call) = &window.function {
                check_aggregate_func(call.func)?;
            }
        }
        if let Some(having) = &query.having {
            check_inline_aggregates(having)?;
        }

        for expr in query
            .filter
            .iter()
            .chain(query.select.iter().map(|s| &s.expr))
            .chain(query.group_by.iter().map(|g| &g.expr))
        {
            if expr.contains_aggregate() {
                return Err(QueryError::invalid_argument(format!(
                    "aggregate not allowed outside HAVING: {}",
                    expr
                )));
            }
        }
        Ok(())
    }

    fn validate_source(&self, source: &TableRef, scope: &[&str]) -> QueryResult<()> {
        match source {
            TableRef::Table { name, .. } => {
                if scope.contains(&name.as_str()) || self.tables.has_table(name) {
                    Ok(())
                } else {
                    Err(QueryError::unknown_table(name))
                }
            }
            TableRef::Subquery { query, .. } => self.validate(query, scope),
        }
    }
}

fn is_derived_table(query: &Query, sub: &Query) -> bool {
    let is_sub = |t: &TableRef| matches!(t, TableRef::Subquery { query: q, .. } if std::ptr::eq(q.as_ref(), sub));
    is_sub(&query.from) || query.joins.iter().any(|j| is_sub(&j.table))
}

/// Visits every table name referenced by `query`, its derived tables, its
/// expression subqueries and its own CTE bodies
fn visit_table_names<'q>(query: &'q Query, f: &mut dyn FnMut(&'q str)) {
    for cte in &query.ctes {
        visit_table_names(&cte.query, f);
    }
    if let TableRef::Table { name, .. } = &query.from {
        f(name);
    }
    for join in &query.joins {
        if let TableRef::Table { name, .. } = &join.table {
            f(name);
        }
    }
    query.for_each_subquery(&mut |sub| visit_table_names(sub, f));
}

fn check_aggregate_func(func: AggregateFunc) -> QueryResult<()> {
    if let AggregateFunc::PercentileCont(p) = func {
        if p < Decimal::ZERO || p > Decimal::ONE {
            return Err(QueryError::invalid_argument(format!(
                "PERCENTILE_CONT fraction must be within [0, 1], got {}",
                p
            )));
        }
    }
    Ok(())
}

fn check_inline_aggregates(expr: &Expr) -> QueryResult<()> {
    match expr {
        Expr::Aggregate(call) => check_aggregate_func(call.func),
        Expr::Binary { left, right, .. } => {
            check_inline_aggregates(left)?;
            check_inline_aggregates(right)
        }
        Expr::Not(e) | Expr::Negate(e) => check_inline_aggregates(e),
        Expr::IsNull { expr, .. }
        | Expr::Like { expr, .. }
        | Expr::Round { expr, .. }
        | Expr::DateTrunc { expr, .. } => check_inline_aggregates(expr),
        Expr::Coalesce(args) => args.iter().try_for_each(check_inline_aggregates),
        Expr::InList { expr, list, .. } => {
            check_inline_aggregates(expr)?;
            list.iter().try_for_each(check_inline_aggregates)
        }
        // subqueries are composed on their own
        Expr::Literal(_) | Expr::Column(_) | Expr::ScalarSubquery(_) | Expr::Exists { .. } => {
            Ok(())
        }
    }
}

fn stages(query: &Query) -> Vec<Stage> {
    let mut stages = Vec::new();

    if !query.ctes.is_empty() {
        stages.push(Stage::MaterializeCtes {
            names: query.ctes.iter().map(|c| c.name.clone()).collect(),
        });
    }

    stages.push(Stage::Scan {
        source: query.from.to_string(),
    });

    for join in &query.joins {
        stages.push(Stage::Join {
            kind: join.kind,
            source: join.table.to_string(),
            on: join.on.to_string(),
        });
    }

    if let Some(filter) = &query.filter {
        stages.push(Stage::Filter {
            predicate: filter.to_string(),
        });
    }

    if query.is_aggregate() {
        stages.push(Stage::Aggregate {
            keys: query.group_by.iter().map(|k| k.to_string()).collect(),
            aggregates: query
                .aggregates
                .iter()
                .map(|a| format!("{} AS {}", a.call, a.alias))
                .collect(),
        });
    }

    if let Some(having) = &query.having {
        stages.push(Stage::Having {
            predicate: having.to_string(),
        });
    }

    for group in group_windows(query) {
        stages.push(Stage::Window {
            spec: group.spec.to_string(),
            functions: group
                .calls
                .iter()
                .map(|&i| {
                    let call = &query.windows[i];
                    format!("{} AS {}", call.function, call.alias)
                })
                .collect(),
        });
    }

    if !query.select.is_empty() {
        stages.push(Stage::Project {
            columns: query.select.iter().map(|s| s.to_string()).collect(),
        });
    }

    if query.distinct {
        stages.push(Stage::Distinct);
    }

    if !query.order_by.is_empty() {
        stages.push(Stage::Sort {
            keys: query.order_by.iter().map(|k| k.to_string()).collect(),
        });
    }

    if query.limit.is_some() || query.offset.is_some() {
        stages.push(Stage::Limit {
            limit: query.limit,
            offset: query.offset.unwrap_or(0),
        });
    }

    stages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ast::{col, count_star, lit, percentile_cont, sum, OrderKey, WindowSpec};
    use crate::planner::errors::QueryErrorCode;
    use crate::storage::MemoryStore;

    fn compose(query: &Query) -> QueryResult<QueryPlan> {
        let store = MemoryStore::with_catalog();
        QueryComposer::new(&store).compose(query)
    }

    #[test]
    fn test_stage_order_is_canonical() {
        // Builder calls deliberately out of SQL order
        let query = Query::from_aliased("orders", "o")
            .limit(3)
            .order_by(OrderKey::desc(col("n")))
            .having(col("n").gt(lit(1)))
            .aggregate(count_star().alias("n"))
            .group_by(col("o.user_id"))
            .filter(col("o.status").equals(lit("paid")))
            .with_cte("paid", Query::from_table("payments"));

        let plan = compose(&query).unwrap();
        let names: Vec<&str> = plan.stages.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec!["CTE", "SCAN", "FILTER", "AGGREGATE", "HAVING", "SORT", "LIMIT"]
        );
    }

    #[test]
    fn test_unknown_table() {
        let err = compose(&Query::from_table("ordrs")).unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::StoreqlUnknownTable);
    }

    #[test]
    fn test_unknown_table_in_subquery() {
        let query = Query::from_table("orders")
            .filter(col("id").gt(crate::planner::ast::scalar_subquery(Query::from_table("nope"))));
        assert_eq!(
            compose(&query).unwrap_err().code(),
            QueryErrorCode::StoreqlUnknownTable
        );
    }

    #[test]
    fn test_cte_visible_to_later_cte_and_main_query() {
        let query = Query::from_table("b")
            .with_cte("a", Query::from_table("orders"))
            .with_cte("b", Query::from_table("a"));
        compose(&query).unwrap();
    }

    #[test]
    fn test_cte_self_reference_is_cyclic() {
        let query = Query::from_table("a").with_cte("a", Query::from_table("a"));
        assert_eq!(
            compose(&query).unwrap_err().code(),
            QueryErrorCode::StoreqlCyclicReference
        );
    }

    #[test]
    fn test_cte_forward_reference_is_cyclic() {
        let query = Query::from_table("b")
            .with_cte("a", Query::from_table("b"))
            .with_cte("b", Query::from_table("orders"));
        assert_eq!(
            compose(&query).unwrap_err().code(),
            QueryErrorCode::StoreqlCyclicReference
        );
    }

    #[test]
    fn test_cte_shadowing_base_table_cannot_read_itself() {
        // "orders" as a CTE name hides the base table inside its own body
        let query = Query::from_table("orders").with_cte("orders", Query::from_table("orders"));
        assert_eq!(
            compose(&query).unwrap_err().code(),
            QueryErrorCode::StoreqlCyclicReference
        );
    }

    #[test]
    fn test_negative_limit_rejected() {
        let err = compose(&Query::from_table("orders").limit(-1)).unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::StoreqlInvalidArgument);
    }

    #[test]
    fn test_percentile_out_of_range_rejected() {
        let query = Query::from_table("orders")
            .aggregate(percentile_cont(Decimal::new(15, 1), col("total_amount")).alias("p"));
        assert_eq!(
            compose(&query).unwrap_err().code(),
            QueryErrorCode::StoreqlInvalidArgument
        );
    }

    #[test]
    fn test_nested_having_percentile_out_of_range_rejected() {
        let percentile = percentile_cont(Decimal::new(15, 1), col("total_amount")).expr();
        let query = Query::from_table("orders")
            .group_by(col("user_id"))
            .aggregate(count_star().alias("n"))
            .having(percentile.round(2).gt(lit(1)));
        assert_eq!(
            compose(&query).unwrap_err().code(),
            QueryErrorCode::StoreqlInvalidArgument
        );

        let listed = percentile_cont(Decimal::new(-1, 0), col("total_amount")).expr();
        let query = Query::from_table("orders")
            .group_by(col("user_id"))
            .aggregate(count_star().alias("n"))
            .having(lit(1).in_list(vec![listed]));
        assert_eq!(
            compose(&query).unwrap_err().code(),
            QueryErrorCode::StoreqlInvalidArgument
        );
    }

    #[test]
    fn test_aggregate_in_where_rejected() {
        let query = Query::from_table("orders").filter(count_star().expr().gt(lit(1)));
        assert_eq!(
            compose(&query).unwrap_err().code(),
            QueryErrorCode::StoreqlInvalidArgument
        );
    }

    #[test]
    fn test_window_calls_share_equal_specs() {
        let by_user = WindowSpec::new()
            .partition_by(col("user_id"))
            .order_by(OrderKey::asc(col("created_at")));
        let query = Query::from_table("orders")
            .window(WindowFunction::RowNumber, by_user.clone(), "rn")
            .window(WindowFunction::Rank, WindowSpec::new(), "r")
            .window(WindowFunction::Aggregate(sum(col("total_amount"))), by_user, "running");

        let plan = compose(&query).unwrap();
        assert_eq!(plan.window_groups.len(), 2);
        assert_eq!(plan.window_groups[0].calls, vec![0, 2]);
        assert_eq!(plan.window_groups[1].calls, vec![1]);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let query = Query::from_aliased("products", "p")
            .inner_join("order_items", "oi", col("p.id").equals(col("oi.product_id")))
            .group_by(col("p.id"))
            .aggregate(count_star().alias("orders"));
        assert_eq!(compose(&query).unwrap(), compose(&query).unwrap());
    }
}
