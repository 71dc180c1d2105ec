//! In-memory row store
//!
//! The store is loaded once and is read-only for the lifetime of a query.
//! Scans return rows in insertion order, which is stable for a given store.

use std::collections::BTreeMap;

use crate::types::{DataType, Row, RowSet, Schema, Value};

use super::catalog::CATALOG;
use super::errors::{StoreError, StoreResult};

/// Read-only table access used by the engine
pub trait TableSource {
    /// Returns all rows of the named table in storage order
    fn scan(&self, table: &str) -> StoreResult<RowSet>;

    /// Returns the unqualified schema of the named table
    fn table_schema(&self, table: &str) -> Option<Schema>;

    /// Names of all tables, sorted
    fn table_names(&self) -> Vec<String>;

    fn has_table(&self, table: &str) -> bool {
        self.table_schema(table).is_some()
    }
}

/// Immutable in-memory tables keyed by name
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, RowSet>,
}

impl MemoryStore {
    /// Creates a store with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with an empty table for every catalog entry
    pub fn with_catalog() -> Self {
        let mut store = Self::new();
        for def in CATALOG {
            store.create_table(def.name, def.schema());
        }
        store
    }

    /// Registers an empty table, replacing any previous one
    pub fn create_table(&mut self, name: impl Into<String>, schema: Schema) {
        self.tables.insert(name.into(), RowSet::empty(schema));
    }

    /// Appends rows to an existing table.
    ///
    /// Each row must match the table width, and each non-null value must
    /// match its column type. Integers are accepted for decimal columns.
    pub fn insert_rows(&mut self, table: &str, rows: Vec<Vec<Value>>) -> StoreResult<()> {
        let existing = self
            .tables
            .remove(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let (schema, mut stored) = existing.into_parts();

        let mut result = Ok(());
        for (n, values) in rows.into_iter().enumerate() {
            match Self::conform(&schema, values) {
                Ok(row) => stored.push(row),
                Err(reason) => {
                    result = Err(StoreError::fixture_malformed(
                        "<in-memory>",
                        format!("{} row {}: {}", table, n, reason),
                    ));
                    break;
                }
            }
        }

        self.tables.insert(table.to_string(), RowSet::new(schema, stored));
        result
    }

    fn conform(schema: &Schema, values: Vec<Value>) -> Result<Row, String> {
        if values.len() != schema.len() {
            return Err(format!(
                "expected {} values, got {}",
                schema.len(),
                values.len()
            ));
        }

        let mut conformed = Vec::with_capacity(values.len());
        for (column, value) in schema.columns().iter().zip(values) {
            let value = match (column.data_type, value) {
                (_, Value::Null) => Value::Null,
                (DataType::Decimal, Value::Int(i)) => Value::Decimal(i.into()),
                (DataType::Any, v) => v,
                (ty, v) if v.data_type() == ty => v,
                (ty, v) => {
                    return Err(format!(
                        "column {} expects {}, got {}",
                        column.name,
                        ty,
                        v.type_name()
                    ))
                }
            };
            conformed.push(value);
        }
        Ok(Row::new(conformed))
    }

    /// Borrows a table without copying
    pub fn table(&self, name: &str) -> Option<&RowSet> {
        self.tables.get(name)
    }

    /// Number of rows in the named table (0 if unknown)
    pub fn row_count(&self, name: &str) -> usize {
        self.tables.get(name).map_or(0, RowSet::len)
    }

    /// Total rows across all tables
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(RowSet::len).sum()
    }
}

impl TableSource for MemoryStore {
    fn scan(&self, table: &str) -> StoreResult<RowSet> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    fn table_schema(&self, table: &str) -> Option<Schema> {
        self.tables.get(table).map(|t| t.schema().clone())
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}
