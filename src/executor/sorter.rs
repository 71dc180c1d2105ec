//! Row sorting for query execution
//!
//! Stable, deterministic multi-key ordering shared by ORDER BY and window
//! partitions.
//!
//! Ordering rules:
//! - NULL sorts last regardless of direction
//! - int and decimal compare numerically
//! - otherwise bool < number < text < timestamp

use std::cmp::Ordering;

use crate::planner::SortDirection;
use crate::types::Value;

/// Sorts keyed rows
pub struct RowSorter;

impl RowSorter {
    /// Sorts items by their precomputed key tuples.
    ///
    /// Sort is stable: ties keep their input order.
    pub fn sort<T>(items: &mut [(Vec<Value>, T)], directions: &[SortDirection]) {
        items.sort_by(|(a, _), (b, _)| Self::compare_keys(a, b, directions));
    }

    /// Sorts positions into `keys` without moving the keys themselves
    pub fn sort_indices(indices: &mut [usize], keys: &[Vec<Value>], directions: &[SortDirection]) {
        indices.sort_by(|&a, &b| Self::compare_keys(&keys[a], &keys[b], directions));
    }

    /// Compares two key tuples column by column
    pub fn compare_keys(a: &[Value], b: &[Value], directions: &[SortDirection]) -> Ordering {
        for (i, (a_val, b_val)) in a.iter().zip(b.iter()).enumerate() {
            let direction = directions.get(i).copied().unwrap_or(SortDirection::Asc);
            let ordering = match (a_val.is_null(), b_val.is_null()) {
                (true, true) => Ordering::Equal,
                // NULL last in both directions
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let ordering = Self::compare_values(a_val, b_val);
                    match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// True when two key tuples are peers (equal under the sort order)
    pub fn is_peer(a: &[Value], b: &[Value]) -> bool {
        a.len() == b.len()
            && a
                .iter()
                .zip(b.iter())
                .all(|(x, y)| match (x.is_null(), y.is_null()) {
                    (true, true) => true,
                    (false, false) => Self::compare_values(x, y) == Ordering::Equal,
                    _ => false,
                })
    }

    /// Total order over non-null values
    pub fn compare_values(a: &Value, b: &Value) -> Ordering {
        let type_order = |v: &Value| -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) | Value::Decimal(_) => 2,
                Value::Text(_) => 3,
                Value::Timestamp(_) => 4,
            }
        };

        let a_type = type_order(a);
        let b_type = type_order(b);
        if a_type != b_type {
            return a_type.cmp(&b_type);
        }

        match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Int(x), Value::Int(y)) => x.cmp(y),
            (Value::Text(x), Value::Text(y)) => x.cmp(y),
            (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
            (x, y) => match (x.as_decimal(), y.as_decimal()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => Ordering::Equal,
            },
        }
    }
}
