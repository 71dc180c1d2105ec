//! storeql - analytical query engine over an in-memory e-commerce store
//!
//! Query descriptions are composed into a fixed-order pipeline (CTEs, joins,
//! filters, grouping, windows, projection, ordering, limits) and executed
//! deterministically against a read-only row store.

pub mod cli;
pub mod executor;
pub mod observability;
pub mod planner;
pub mod reports;
pub mod storage;
pub mod types;
