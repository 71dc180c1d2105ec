//! Fixture loader for populating a store from disk
//!
//! Layout:
//! - One file per catalog table at `<dir>/<table>.json`
//! - Each file is a JSON array of objects keyed by column name
//! - Missing files produce empty tables
//! - Missing keys load as NULL

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::types::Value;

use super::catalog::{TableDef, CATALOG};
use super::errors::{StoreError, StoreResult};
use super::memory::MemoryStore;

/// Loads catalog tables from a fixture directory
pub struct FixtureLoader {
    fixture_dir: PathBuf,
}

impl FixtureLoader {
    pub fn new(fixture_dir: &Path) -> Self {
        Self {
            fixture_dir: fixture_dir.to_path_buf(),
        }
    }

    pub fn fixture_dir(&self) -> &Path {
        &self.fixture_dir
    }

    /// Loads every catalog table into a new store.
    pub fn load(&self) -> StoreResult<MemoryStore> {
        if !self.fixture_dir.is_dir() {
            return Err(StoreError::fixture_io(
                self.fixture_dir.display().to_string(),
                "fixture directory does not exist",
            ));
        }

        let mut store = MemoryStore::with_catalog();
        for def in CATALOG {
            let path = self.fixture_dir.join(format!("{}.json", def.name));
            if !path.exists() {
                continue;
            }
            let rows = Self::load_table_file(&path, def)?;
            store.insert_rows(def.name, rows).map_err(|e| {
                StoreError::fixture_malformed(path.display().to_string(), e.to_string())
            })?;
        }

        Ok(store)
    }

    fn load_table_file(path: &Path, def: &TableDef) -> StoreResult<Vec<Vec<Value>>> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::fixture_io(path.display().to_string(), e.to_string()))?;

        let json: JsonValue = serde_json::from_str(&content).map_err(|e| {
            StoreError::fixture_malformed(path.display().to_string(), format!("Invalid JSON: {}", e))
        })?;

        let records = json.as_array().ok_or_else(|| {
            StoreError::fixture_malformed(path.display().to_string(), "expected a JSON array")
        })?;

        let mut rows = Vec::with_capacity(records.len());
        for (n, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| {
                StoreError::fixture_malformed(
                    path.display().to_string(),
                    format!("record {} is not an object", n),
                )
            })?;

            let mut values = Vec::with_capacity(def.columns.len());
            for (column, data_type) in def.columns {
                let raw = object.get(*column).unwrap_or(&JsonValue::Null);
                let value = Value::from_json(raw, *data_type).ok_or_else(|| {
                    StoreError::fixture_malformed(
                        path.display().to_string(),
                        format!("record {} column {}: expected {}", n, column, data_type),
                    )
                })?;
                values.push(value);
            }
            rows.push(values);
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    #[test]
    fn test_load_tables_from_fixtures() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("products.json"),
            r#"[{"id": 1, "name": "Lamp", "price": "19.90", "stock": 4, "created_at": "2024-01-02 03:04:05"}]"#,
        )
        .unwrap();

        let store = FixtureLoader::new(dir.path()).load().unwrap();
        let products = store.table("products").unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(
            products.value(0, "price"),
            Some(&Value::Decimal(Decimal::new(1990, 2)))
        );
        assert_eq!(products.value(0, "brand"), Some(&Value::Null));
        assert_eq!(store.row_count("orders"), 0);
    }

    #[test]
    fn test_malformed_value_names_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("orders.json"), r#"[{"id": "one"}]"#).unwrap();

        let err = FixtureLoader::new(dir.path()).load().unwrap_err();
        assert_eq!(err.code(), "STOREQL_STORE_FIXTURE_MALFORMED");
        assert!(err.to_string().contains("orders.json"));
    }

    #[test]
    fn test_non_array_fixture_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("users.json"), r#"{"id": 1}"#).unwrap();

        let err = FixtureLoader::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("expected a JSON array"));
    }

    #[test]
    fn test_missing_directory() {
        let err = FixtureLoader::new(Path::new("/definitely/not/here"))
            .load()
            .unwrap_err();
        assert_eq!(err.code(), "STOREQL_STORE_FIXTURE_IO");
    }
}
