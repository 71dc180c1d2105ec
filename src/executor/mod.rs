//! Query Executor subsystem for storeql
//!
//! Consumes composed plans and produces deterministic row sets.
//!
//! # Execution Flow (strict order)
//!
//! 1. Materialize CTEs once each
//! 2. Scan, join, filter
//! 3. Group, aggregate, HAVING
//! 4. Window functions
//! 5. Project, DISTINCT, sort, limit
//!
//! # Invariants
//!
//! - Deterministic execution: ties keep input order everywhere
//! - The store is only read; all intermediate state belongs to one execution
//! - Any error aborts the whole execution

mod aggregate;
mod context;
mod executor;
mod expression;
mod operators;
mod result;
mod sorter;
mod window;

pub use aggregate::{percentile_cont, Accumulator};
pub use context::CteScope;
pub use executor::{execute_query, QueryExecutor};
pub use expression::{compare, Binder, BoundExpr, EvalContext, OuterRow, SubqueryRunner};
pub use operators::{Relation, RowStream};
pub use result::{ExecutionResult, ExecutionStats};
pub use sorter::RowSorter;
