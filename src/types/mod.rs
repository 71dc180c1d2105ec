//! Engine data model
//!
//! Typed scalar values, column schemas, immutable rows and row sets.
//! Row sets are produced fresh per query stage and moved downstream.

mod row;
mod schema;
mod value;

pub use row::{Row, RowSet};
pub use schema::{Column, DataType, Lookup, Schema};
pub use value::{parse_timestamp, Value, TIMESTAMP_FORMAT};
