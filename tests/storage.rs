//! Storage Tests
//!
//! Tests for the row store boundary:
//! - Fixture directories load into typed tables
//! - Loaded stores pass or fail integrity checks
//! - Reports run unchanged over fixture-loaded stores

use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde_json::json;
use storeql::executor::execute_query;
use storeql::reports;
use storeql::storage::{check_store, FixtureLoader, StoreError, TableSource};
use storeql::types::Value;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_fixture(dir: &Path, table: &str, rows: serde_json::Value) {
    fs::write(dir.join(format!("{}.json", table)), rows.to_string()).unwrap();
}

/// Two users, two products in one category, one order with two lines
fn write_shop(dir: &Path) {
    write_fixture(
        dir,
        "users",
        json!([
            {"id": 1, "name": "Ann", "email": "ann@example.com", "status": "active", "created_at": "2024-01-05 10:00:00"},
            {"id": 2, "name": "Bob", "email": "bob@example.com", "status": "active", "created_at": "2024-02-01T08:30:00"}
        ]),
    );
    write_fixture(
        dir,
        "categories",
        json!([
            {"id": 1, "parent_id": null, "name": "Books", "slug": "books", "is_active": true}
        ]),
    );
    write_fixture(
        dir,
        "products",
        json!([
            {"id": 1, "name": "Rust Book", "brand": "Press", "price": "39.90", "discount_price": null,
             "stock": 5, "description": null, "created_at": "2024-01-01 00:00:00"},
            {"id": 2, "name": "Notebook", "brand": "Paper", "price": 4.5, "discount_price": null,
             "stock": 50, "description": "lined", "created_at": "2024-01-01 00:00:00"}
        ]),
    );
    write_fixture(
        dir,
        "products_categories",
        json!([
            {"product_id": 1, "category_id": 1},
            {"product_id": 2, "category_id": 1}
        ]),
    );
    write_fixture(
        dir,
        "orders",
        json!([
            {"id": 1, "user_id": 2, "status": "paid", "total_amount": "48.90", "created_at": "2024-03-03 12:00:00"}
        ]),
    );
    write_fixture(
        dir,
        "order_items",
        json!([
            {"id": 1, "order_id": 1, "product_id": 1, "quantity": 1, "unit_price": "39.90"},
            {"id": 2, "order_id": 1, "product_id": 2, "quantity": 2, "unit_price": "4.50"}
        ]),
    );
}

// =============================================================================
// Loading Tests
// =============================================================================

#[test]
fn test_fixture_store_is_typed() {
    let dir = TempDir::new().unwrap();
    write_shop(dir.path());

    let store = FixtureLoader::new(dir.path()).load().unwrap();
    assert_eq!(store.row_count("users"), 2);
    assert_eq!(store.row_count("reviews"), 0);

    let products = store.scan("products").unwrap();
    assert_eq!(
        products.value(0, "price"),
        Some(&Value::Decimal(Decimal::new(3990, 2)))
    );
    assert_eq!(
        products.value(1, "price"),
        Some(&Value::Decimal(Decimal::new(45, 1)))
    );
    assert!(matches!(
        store.scan("users").unwrap().value(1, "created_at"),
        Some(Value::Timestamp(_))
    ));
}

#[test]
fn test_malformed_fixture_names_table_file() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "orders", json!([{"id": "one"}]));

    let err = FixtureLoader::new(dir.path()).load().unwrap_err();
    match err {
        StoreError::FixtureMalformed { path, .. } => assert!(path.ends_with("orders.json")),
        other => panic!("unexpected error {:?}", other),
    }
}

// =============================================================================
// Integrity Tests
// =============================================================================

#[test]
fn test_fixture_store_passes_integrity() {
    let dir = TempDir::new().unwrap();
    write_shop(dir.path());
    let store = FixtureLoader::new(dir.path()).load().unwrap();
    check_store(&store).unwrap();
}

#[test]
fn test_negative_price_fails_integrity() {
    let dir = TempDir::new().unwrap();
    write_shop(dir.path());
    write_fixture(
        dir.path(),
        "products",
        json!([
            {"id": 1, "name": "Refund", "brand": null, "price": "-1.00", "discount_price": null,
             "stock": 0, "description": null, "created_at": null},
            {"id": 2, "name": "Notebook", "brand": null, "price": "4.50", "discount_price": null,
             "stock": 1, "description": null, "created_at": null}
        ]),
    );
    let store = FixtureLoader::new(dir.path()).load().unwrap();
    assert!(matches!(
        check_store(&store),
        Err(StoreError::IntegrityViolation { .. })
    ));
}

#[test]
fn test_dangling_order_item_fails_integrity() {
    let dir = TempDir::new().unwrap();
    write_shop(dir.path());
    write_fixture(
        dir.path(),
        "order_items",
        json!([{"id": 1, "order_id": 7, "product_id": 1, "quantity": 1, "unit_price": "39.90"}]),
    );
    let store = FixtureLoader::new(dir.path()).load().unwrap();
    assert!(check_store(&store).is_err());
}

// =============================================================================
// Reports Over Fixtures
// =============================================================================

#[test]
fn test_top_spenders_over_fixtures() {
    let dir = TempDir::new().unwrap();
    write_shop(dir.path());
    let store = FixtureLoader::new(dir.path()).load().unwrap();

    let rows = execute_query(&store, &reports::find("top_spenders").unwrap().query())
        .unwrap()
        .rows;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.value(0, "user_name"), Some(&Value::from("Bob")));
    assert_eq!(
        rows.value(0, "total_spent").and_then(Value::as_decimal),
        Some(Decimal::new(4890, 2))
    );
}

#[test]
fn test_every_report_runs_over_fixtures() {
    let dir = TempDir::new().unwrap();
    write_shop(dir.path());
    let store = FixtureLoader::new(dir.path()).load().unwrap();

    for report in reports::REPORTS {
        let result = execute_query(&store, &report.query());
        assert!(result.is_ok(), "{}: {:?}", report.name, result.err());
    }
}
