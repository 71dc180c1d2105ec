//! Rows and row sets
//!
//! Rows are immutable once produced and cheap to clone; a row set owns its
//! rows and hands them downstream by value.

use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use super::schema::{Lookup, Schema};
use super::value::Value;

/// An immutable vector of values, positionally matching a schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row(Arc<[Value]>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Row(values.into())
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values of `self` followed by values of `other`
    pub fn concat(&self, other: &Row) -> Row {
        let mut values = Vec::with_capacity(self.len() + other.len());
        values.extend_from_slice(&self.0);
        values.extend_from_slice(&other.0);
        Row::new(values)
    }

    /// Values of `self` followed by `width` NULLs
    pub fn pad_nulls(&self, width: usize) -> Row {
        let mut values = Vec::with_capacity(self.len() + width);
        values.extend_from_slice(&self.0);
        values.extend(std::iter::repeat(Value::Null).take(width));
        Row::new(values)
    }

    /// Values of `self` followed by `extra`
    pub fn extend(&self, extra: impl IntoIterator<Item = Value>) -> Row {
        let mut values = self.0.to_vec();
        values.extend(extra);
        Row::new(values)
    }

    /// The first `n` values
    pub fn prefix(&self, n: usize) -> Row {
        Row::new(self.0.iter().take(n).cloned().collect())
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// An ordered sequence of rows sharing one schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSet {
    schema: Schema,
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn into_parts(self) -> (Schema, Vec<Row>) {
        (self.schema, self.rows)
    }

    /// Value of the named column in the given row.
    ///
    /// The name may be qualified (`p.id`). Returns None for unknown or
    /// ambiguous names.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// All values of the named column, in row order
    pub fn column_values(&self, column: &str) -> Option<Vec<Value>> {
        let index = self.column_index(column)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(index).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        let lookup = match column.split_once('.') {
            Some((q, n)) => self.schema.lookup(Some(q), n),
            None => self.schema.lookup(None, column),
        };
        match lookup {
            Lookup::Found(i) => Some(i),
            _ => None,
        }
    }

    /// Renders `{"columns": [...], "rows": [[...], ...]}`
    pub fn to_json(&self) -> JsonValue {
        let columns: Vec<String> = self.schema.names().iter().map(|n| n.to_string()).collect();
        let rows: Vec<JsonValue> = self
            .rows
            .iter()
            .map(|r| JsonValue::Array(r.values().iter().map(Value::to_json).collect()))
            .collect();
        json!({ "columns": columns, "rows": rows })
    }

    /// CRC32 over the canonical JSON rendering.
    ///
    /// Identical row sets (same columns, same values, same order) always
    /// produce the same fingerprint.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.to_json().to_string().as_bytes());
        for column in self.schema.columns() {
            hasher.update(column.data_type.type_name().as_bytes());
        }
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, DataType};

    fn sample() -> RowSet {
        let schema = Schema::new(vec![
            Column::qualified("u", "id", DataType::Int),
            Column::qualified("u", "name", DataType::Text),
        ]);
        RowSet::new(
            schema,
            vec![
                Row::new(vec![Value::Int(1), Value::from("alice")]),
                Row::new(vec![Value::Int(2), Value::Null]),
            ],
        )
    }

    #[test]
    fn test_value_lookup_by_name() {
        let rs = sample();
        assert_eq!(rs.value(0, "name"), Some(&Value::from("alice")));
        assert_eq!(rs.value(1, "u.name"), Some(&Value::Null));
        assert_eq!(rs.value(0, "missing"), None);
    }

    #[test]
    fn test_row_concat_and_pad() {
        let row = Row::new(vec![Value::Int(1)]);
        assert_eq!(row.pad_nulls(2).values(), &[Value::Int(1), Value::Null, Value::Null]);
        assert_eq!(row.concat(&row).len(), 2);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(sample().fingerprint(), sample().fingerprint());

        let (schema, mut rows) = sample().into_parts();
        rows.reverse();
        assert_ne!(RowSet::new(schema, rows).fingerprint(), sample().fingerprint());
    }

    #[test]
    fn test_to_json_shape() {
        let json = sample().to_json();
        assert_eq!(json["columns"][1], "name");
        assert_eq!(json["rows"][0][0], 1);
        assert!(json["rows"][1][1].is_null());
    }
}
