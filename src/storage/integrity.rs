//! Store integrity checks
//!
//! Verifies catalog invariants over a loaded store:
//! - ids are unique per table
//! - foreign keys point at existing rows (NULL references are allowed)
//! - money amounts and stock are non-negative
//! - quantities are positive
//! - ratings stay within the rating scale
//! - the category parent chain has no cycles
//!
//! The first violation found is returned; checks run in a fixed order so the
//! reported violation is deterministic.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;

use crate::types::Value;

use super::catalog::RATING_RANGE;
use super::errors::{StoreError, StoreResult};
use super::memory::MemoryStore;

/// (table, column, referenced table)
const FOREIGN_KEYS: &[(&str, &str, &str)] = &[
    ("user_addresses", "user_id", "users"),
    ("categories", "parent_id", "categories"),
    ("products_categories", "product_id", "products"),
    ("products_categories", "category_id", "categories"),
    ("orders", "user_id", "users"),
    ("order_items", "order_id", "orders"),
    ("order_items", "product_id", "products"),
    ("payments", "order_id", "orders"),
    ("payments", "user_id", "users"),
    ("reviews", "user_id", "users"),
    ("reviews", "product_id", "products"),
    ("wishlists", "user_id", "users"),
    ("wishlists", "product_id", "products"),
    ("shopping_carts", "user_id", "users"),
    ("shopping_carts", "product_id", "products"),
];

const NON_NEGATIVE: &[(&str, &str)] = &[
    ("products", "price"),
    ("products", "discount_price"),
    ("products", "stock"),
    ("orders", "total_amount"),
    ("order_items", "unit_price"),
    ("payments", "amount"),
];

const POSITIVE_QUANTITY: &[(&str, &str)] = &[("order_items", "quantity"), ("shopping_carts", "quantity")];

/// Runs every check against the store
pub fn check_store(store: &MemoryStore) -> StoreResult<()> {
    check_unique_ids(store)?;
    check_foreign_keys(store)?;
    check_amounts(store)?;
    check_ratings(store)?;
    check_category_tree(store)?;
    Ok(())
}

fn column(store: &MemoryStore, table: &str, name: &str) -> Option<Vec<Value>> {
    store.table(table)?.column_values(name)
}

fn check_unique_ids(store: &MemoryStore) -> StoreResult<()> {
    for table in store_tables_with_id(store) {
        let Some(ids) = column(store, &table, "id") else {
            continue;
        };
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids.iter().filter(|v| !v.is_null()) {
            if !seen.insert(id.key()) {
                return Err(StoreError::integrity(table, format!("duplicate id {}", id)));
            }
        }
    }
    Ok(())
}

fn store_tables_with_id(store: &MemoryStore) -> Vec<String> {
    use super::memory::TableSource;
    store
        .table_names()
        .into_iter()
        .filter(|t| store.table(t).and_then(|r| r.column_values("id")).is_some())
        .collect()
}

fn check_foreign_keys(store: &MemoryStore) -> StoreResult<()> {
    let mut id_sets: HashMap<&str, HashSet<Value>> = HashMap::new();

    for (table, fk_column, referenced) in FOREIGN_KEYS {
        let Some(references) = column(store, table, fk_column) else {
            continue;
        };

        if !id_sets.contains_key(referenced) {
            let ids: HashSet<Value> = column(store, referenced, "id")
                .map(|ids| ids.iter().map(Value::key).collect())
                .unwrap_or_default();
            id_sets.insert(*referenced, ids);
        }
        let Some(ids) = id_sets.get(referenced) else {
            continue;
        };

        for (row, value) in references.iter().enumerate() {
            if !value.is_null() && !ids.contains(&value.key()) {
                return Err(StoreError::integrity(
                    *table,
                    format!(
                        "row {}: {} = {} has no matching {}.id",
                        row, fk_column, value, referenced
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_amounts(store: &MemoryStore) -> StoreResult<()> {
    for (table, name) in NON_NEGATIVE {
        let Some(values) = column(store, table, name) else {
            continue;
        };
        for (row, value) in values.iter().enumerate() {
            if value.as_decimal().is_some_and(|d| d < Decimal::ZERO) {
                return Err(StoreError::integrity(
                    *table,
                    format!("row {}: {} must not be negative, got {}", row, name, value),
                ));
            }
        }
    }

    for (table, name) in POSITIVE_QUANTITY {
        let Some(values) = column(store, table, name) else {
            continue;
        };
        for (row, value) in values.iter().enumerate() {
            if value.as_int().is_some_and(|q| q <= 0) {
                return Err(StoreError::integrity(
                    *table,
                    format!("row {}: {} must be positive, got {}", row, name, value),
                ));
            }
        }
    }
    Ok(())
}

fn check_ratings(store: &MemoryStore) -> StoreResult<()> {
    let Some(ratings) = column(store, "reviews", "rating") else {
        return Ok(());
    };
    for (row, value) in ratings.iter().enumerate() {
        if let Some(rating) = value.as_int() {
            if !RATING_RANGE.contains(&rating) {
                return Err(StoreError::integrity(
                    "reviews",
                    format!(
                        "row {}: rating {} outside {}..={}",
                        row,
                        rating,
                        RATING_RANGE.start(),
                        RATING_RANGE.end()
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Walks each category's parent chain. A chain longer than the number of
/// categories must revisit a node.
fn check_category_tree(store: &MemoryStore) -> StoreResult<()> {
    let Some(categories) = store.table("categories") else {
        return Ok(());
    };
    let (Some(ids), Some(parents)) = (
        categories.column_values("id"),
        categories.column_values("parent_id"),
    ) else {
        return Ok(());
    };

    let parent_of: HashMap<i64, i64> = ids
        .iter()
        .zip(parents.iter())
        .filter_map(|(id, parent)| Some((id.as_int()?, parent.as_int()?)))
        .collect();

    let mut starts: Vec<i64> = parent_of.keys().copied().collect();
    starts.sort_unstable();

    for start in starts {
        let mut current = start;
        let mut steps = 0usize;
        while let Some(&parent) = parent_of.get(&current) {
            if parent == start || steps > parent_of.len() {
                return Err(StoreError::integrity(
                    "categories",
                    format!("category {} is its own ancestor", start),
                ));
            }
            current = parent;
            steps += 1;
        }
    }
    Ok(())
}
