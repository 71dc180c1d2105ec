//! Query planner subsystem for storeql
//!
//! Turns a structured query description into a validated, ordered pipeline.
//!
//! # Design Principles
//!
//! - Deterministic: same description → same plan
//! - Canonical order: CTEs → FROM/JOIN → WHERE → GROUP BY → HAVING → WINDOW →
//!   SELECT → DISTINCT → ORDER BY → LIMIT, regardless of builder call order
//! - Early rejection: unknown tables, CTE cycles and bad arguments fail before
//!   any row is read
//! - Typed literals only: descriptions carry values, never query text

mod ast;
mod errors;
mod explain;
mod planner;

pub use ast::{
    avg, coalesce, col, count, count_star, date_trunc, dec, exists, lit, max, min, not_exists,
    percentile_cont, scalar_subquery, sum, AggregateCall, AggregateFunc, AggregateSpec, BinaryOp,
    ColumnRef, Cte, DateUnit, Expr, Join, JoinKind, OrderKey, Query, SelectItem, SortDirection,
    TableRef, WindowCall, WindowFrame, WindowFunction, WindowSpec,
};
pub use errors::{QueryError, QueryErrorCode, QueryPhase, QueryResult};
pub use explain::ExplainPlan;
pub use planner::{group_windows, QueryComposer, QueryPlan, Stage, WindowGroup};
