//! E-commerce catalog
//!
//! Fixed table definitions for the store's sample domain. Column order here
//! is the column order of every scan.

use crate::types::{Column, DataType, Schema};

/// Static table definition
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [(&'static str, DataType)],
}

impl TableDef {
    /// Unqualified schema for this table
    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|(name, ty)| Column::new(*name, *ty))
                .collect(),
        )
    }
}

use DataType::{Bool, Decimal, Int, Text, Timestamp};

pub const USERS: TableDef = TableDef {
    name: "users",
    columns: &[
        ("id", Int),
        ("name", Text),
        ("email", Text),
        ("status", Text),
        ("created_at", Timestamp),
    ],
};

pub const USER_ADDRESSES: TableDef = TableDef {
    name: "user_addresses",
    columns: &[
        ("id", Int),
        ("user_id", Int),
        ("city", Text),
        ("country", Text),
        ("is_default", Bool),
    ],
};

pub const CATEGORIES: TableDef = TableDef {
    name: "categories",
    columns: &[
        ("id", Int),
        ("parent_id", Int),
        ("name", Text),
        ("slug", Text),
        ("is_active", Bool),
    ],
};

pub const PRODUCTS: TableDef = TableDef {
    name: "products",
    columns: &[
        ("id", Int),
        ("name", Text),
        ("brand", Text),
        ("price", Decimal),
        ("discount_price", Decimal),
        ("stock", Int),
        ("description", Text),
        ("created_at", Timestamp),
    ],
};

pub const PRODUCTS_CATEGORIES: TableDef = TableDef {
    name: "products_categories",
    columns: &[("product_id", Int), ("category_id", Int)],
};

pub const ORDERS: TableDef = TableDef {
    name: "orders",
    columns: &[
        ("id", Int),
        ("user_id", Int),
        ("status", Text),
        ("total_amount", Decimal),
        ("created_at", Timestamp),
    ],
};

pub const ORDER_ITEMS: TableDef = TableDef {
    name: "order_items",
    columns: &[
        ("id", Int),
        ("order_id", Int),
        ("product_id", Int),
        ("quantity", Int),
        ("unit_price", Decimal),
    ],
};

pub const PAYMENTS: TableDef = TableDef {
    name: "payments",
    columns: &[
        ("id", Int),
        ("order_id", Int),
        ("user_id", Int),
        ("amount", Decimal),
        ("payment_method", Text),
        ("status", Text),
        ("payment_date", Timestamp),
    ],
};

pub const REVIEWS: TableDef = TableDef {
    name: "reviews",
    columns: &[
        ("id", Int),
        ("user_id", Int),
        ("product_id", Int),
        ("rating", Int),
        ("comment", Text),
        ("created_at", Timestamp),
    ],
};

pub const WISHLISTS: TableDef = TableDef {
    name: "wishlists",
    columns: &[("user_id", Int), ("product_id", Int), ("created_at", Timestamp)],
};

pub const SHOPPING_CARTS: TableDef = TableDef {
    name: "shopping_carts",
    columns: &[("user_id", Int), ("product_id", Int), ("quantity", Int)],
};

/// Every catalog table, in dependency order (referenced tables first)
pub const CATALOG: &[TableDef] = &[
    USERS,
    USER_ADDRESSES,
    CATEGORIES,
    PRODUCTS,
    PRODUCTS_CATEGORIES,
    ORDERS,
    ORDER_ITEMS,
    PAYMENTS,
    REVIEWS,
    WISHLISTS,
    SHOPPING_CARTS,
];

/// Review ratings are bounded to this scale
pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// Looks up a catalog table definition by name
pub fn table_def(name: &str) -> Option<&'static TableDef> {
    CATALOG.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let orders = table_def("orders").unwrap();
        assert_eq!(orders.schema().names()[3], "total_amount");
        assert!(table_def("nope").is_none());
    }

    #[test]
    fn test_catalog_names_unique() {
        let mut names: Vec<_> = CATALOG.iter().map(|t| t.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), CATALOG.len());
    }
}
