//! Deterministic sample data generator
//!
//! Produces a complete, referentially consistent store from a seed.
//! Same seed + same sizes = same store, row for row. Timestamps are offsets
//! from a fixed base instant, never from the wall clock.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::types::Value;

use super::catalog;
use super::errors::{StoreError, StoreResult};
use super::memory::MemoryStore;

/// 2024-01-01 00:00:00 UTC
const BASE_EPOCH_SECS: i64 = 1_704_067_200;

const SECONDS_PER_DAY: i64 = 86_400;

/// (id, parent_id, name)
const CATEGORY_TREE: &[(i64, Option<i64>, &str)] = &[
    (1, None, "Electronics"),
    (2, Some(1), "Phones"),
    (3, Some(1), "Laptops"),
    (4, None, "Home"),
    (5, Some(4), "Kitchen"),
    (6, Some(4), "Furniture"),
    (7, None, "Books"),
    (8, Some(7), "Fiction"),
    (9, Some(7), "Science"),
    (10, None, "Sports"),
];

const FIRST_NAMES: &[&str] = &[
    "alex", "maria", "ivan", "olga", "sam", "lena", "tom", "nina", "max", "kate",
];
const ADJECTIVES: &[&str] = &[
    "Compact", "Smart", "Classic", "Ultra", "Eco", "Pro", "Mini", "Deluxe",
];
const NOUNS: &[&str] = &[
    "Lamp", "Phone", "Kettle", "Chair", "Novel", "Ball", "Laptop", "Desk", "Atlas", "Racket",
];
const BRANDS: &[&str] = &["Acme", "Globex", "Initech", "Umbrella", "Stark"];
const CITIES: &[(&str, &str)] = &[
    ("Berlin", "DE"),
    ("Paris", "FR"),
    ("Madrid", "ES"),
    ("Austin", "US"),
    ("Tokyo", "JP"),
];
const USER_STATUSES: &[&str] = &["active", "active", "active", "banned", "deleted"];
const ORDER_STATUSES: &[&str] = &["pending", "paid", "shipped", "delivered", "cancelled"];
const PAYMENT_METHODS: &[&str] = &["card", "paypal", "bank_transfer"];

/// Sizes of the generated data set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedConfig {
    pub seed: u64,
    pub users: usize,
    pub products: usize,
    pub orders: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            users: 50,
            products: 40,
            orders: 200,
        }
    }
}

/// Generates sample stores
pub struct SeedGenerator {
    config: SeedConfig,
    rng: StdRng,
    base: NaiveDateTime,
}

impl SeedGenerator {
    pub fn new(config: SeedConfig) -> StoreResult<Self> {
        let base = DateTime::from_timestamp(BASE_EPOCH_SECS, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| StoreError::integrity("seed", "invalid base instant"))?;

        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(config.seed),
            base,
        })
    }

    /// Generates every catalog table
    pub fn generate(mut self) -> StoreResult<MemoryStore> {
        let mut store = MemoryStore::with_catalog();

        store.insert_rows(catalog::CATEGORIES.name, self.categories())?;

        let users = self.users();
        let user_ids: Vec<i64> = (1..=users.len() as i64).collect();
        store.insert_rows(catalog::USERS.name, users)?;
        store.insert_rows(catalog::USER_ADDRESSES.name, self.addresses(&user_ids))?;

        let (products, prices) = self.products();
        store.insert_rows(catalog::PRODUCTS.name, products)?;
        store.insert_rows(catalog::PRODUCTS_CATEGORIES.name, self.product_categories(prices.len()))?;

        let (orders, items, payments) = self.orders(&user_ids, &prices);
        store.insert_rows(catalog::ORDERS.name, orders)?;
        store.insert_rows(catalog::ORDER_ITEMS.name, items)?;
        store.insert_rows(catalog::PAYMENTS.name, payments)?;

        store.insert_rows(catalog::REVIEWS.name, self.reviews(&user_ids, prices.len()))?;
        let (wishlists, carts) = self.wishlists_and_carts(&user_ids, prices.len());
        store.insert_rows(catalog::WISHLISTS.name, wishlists)?;
        store.insert_rows(catalog::SHOPPING_CARTS.name, carts)?;

        Ok(store)
    }

    fn at(&self, seconds: i64) -> NaiveDateTime {
        self.base + Duration::seconds(seconds)
    }

    fn random_instant(&mut self, max_days: i64) -> NaiveDateTime {
        let days = self.rng.gen_range(0..max_days);
        let secs = self.rng.gen_range(0..SECONDS_PER_DAY);
        self.at(days * SECONDS_PER_DAY + secs)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn categories(&self) -> Vec<Vec<Value>> {
        CATEGORY_TREE
            .iter()
            .map(|(id, parent, name)| {
                vec![
                    Value::Int(*id),
                    Value::from(*parent),
                    Value::from(*name),
                    Value::Text(name.to_lowercase()),
                    Value::Bool(true),
                ]
            })
            .collect()
    }

    fn users(&mut self) -> Vec<Vec<Value>> {
        (1..=self.config.users as i64)
            .map(|id| {
                let name = format!("{}_{}", self.pick(FIRST_NAMES), id);
                let status = self.pick(USER_STATUSES);
                vec![
                    Value::Int(id),
                    Value::Text(name.clone()),
                    Value::Text(format!("{}@example.com", name)),
                    Value::from(status),
                    Value::Timestamp(self.random_instant(365)),
                ]
            })
            .collect()
    }

    fn addresses(&mut self, user_ids: &[i64]) -> Vec<Vec<Value>> {
        let mut rows = Vec::new();
        for &user_id in user_ids {
            if self.rng.gen_bool(0.4) {
                continue;
            }
            let (city, country) = CITIES[self.rng.gen_range(0..CITIES.len())];
            rows.push(vec![
                Value::Int(rows.len() as i64 + 1),
                Value::Int(user_id),
                Value::from(city),
                Value::from(country),
                Value::Bool(true),
            ]);
        }
        rows
    }

    /// Returns product rows and each product's price (index = id - 1)
    fn products(&mut self) -> (Vec<Vec<Value>>, Vec<Decimal>) {
        let mut rows = Vec::with_capacity(self.config.products);
        let mut prices = Vec::with_capacity(self.config.products);

        for id in 1..=self.config.products as i64 {
            let name = format!("{} {}", self.pick(ADJECTIVES), self.pick(NOUNS));
            let brand = self.pick(BRANDS);
            let cents: i64 = self.rng.gen_range(500..=200_000);
            let price = Decimal::new(cents, 2);
            let discount = if self.rng.gen_bool(0.3) {
                Value::Decimal(Decimal::new(cents * self.rng.gen_range(70..=95) / 100, 2))
            } else {
                Value::Null
            };
            let stock: i64 = self.rng.gen_range(0..=500);
            let created = self.random_instant(30);

            rows.push(vec![
                Value::Int(id),
                Value::Text(name.clone()),
                Value::from(brand),
                Value::Decimal(price),
                discount,
                Value::Int(stock),
                Value::Text(format!("{} by {}", name, brand)),
                Value::Timestamp(created),
            ]);
            prices.push(price);
        }

        (rows, prices)
    }

    fn product_categories(&mut self, product_count: usize) -> Vec<Vec<Value>> {
        let mut rows = Vec::new();
        for product_id in 1..=product_count as i64 {
            let wanted = self.rng.gen_range(1..=3);
            let mut chosen = BTreeSet::new();
            while chosen.len() < wanted {
                let (category_id, _, _) = CATEGORY_TREE[self.rng.gen_range(0..CATEGORY_TREE.len())];
                chosen.insert(category_id);
            }
            for category_id in chosen {
                rows.push(vec![Value::Int(product_id), Value::Int(category_id)]);
            }
        }
        rows
    }

    #[allow(clippy::type_complexity)]
    fn orders(
        &mut self,
        user_ids: &[i64],
        prices: &[Decimal],
    ) -> (Vec<Vec<Value>>, Vec<Vec<Value>>, Vec<Vec<Value>>) {
        let mut orders = Vec::with_capacity(self.config.orders);
        let mut items = Vec::new();
        let mut payments = Vec::new();

        if user_ids.is_empty() || prices.is_empty() {
            return (orders, items, payments);
        }

        for order_id in 1..=self.config.orders as i64 {
            let user_id = user_ids[self.rng.gen_range(0..user_ids.len())];
            let status = self.pick(ORDER_STATUSES);
            let created = self.random_instant(365);

            let item_count = self.rng.gen_range(1..=4usize).min(prices.len());
            let mut product_ids = BTreeSet::new();
            while product_ids.len() < item_count {
                product_ids.insert(self.rng.gen_range(0..prices.len()));
            }

            let mut total = Decimal::ZERO;
            for index in product_ids {
                let quantity: i64 = self.rng.gen_range(1..=5);
                let unit_price = prices[index];
                total += unit_price * Decimal::from(quantity);
                items.push(vec![
                    Value::Int(items.len() as i64 + 1),
                    Value::Int(order_id),
                    Value::Int(index as i64 + 1),
                    Value::Int(quantity),
                    Value::Decimal(unit_price),
                ]);
            }

            if status != "pending" && status != "cancelled" {
                let method = self.pick(PAYMENT_METHODS);
                let paid_at = created + Duration::seconds(self.rng.gen_range(60..SECONDS_PER_DAY));
                payments.push(vec![
                    Value::Int(payments.len() as i64 + 1),
                    Value::Int(order_id),
                    Value::Int(user_id),
                    Value::Decimal(total),
                    Value::from(method),
                    Value::from("completed"),
                    Value::Timestamp(paid_at),
                ]);
            }

            orders.push(vec![
                Value::Int(order_id),
                Value::Int(user_id),
                Value::from(status),
                Value::Decimal(total),
                Value::Timestamp(created),
            ]);
        }

        (orders, items, payments)
    }

    fn reviews(&mut self, user_ids: &[i64], product_count: usize) -> Vec<Vec<Value>> {
        let mut rows = Vec::new();
        if user_ids.is_empty() || product_count == 0 {
            return rows;
        }
        for id in 1..=(self.config.orders / 2) as i64 {
            let user_id = user_ids[self.rng.gen_range(0..user_ids.len())];
            let product_id = self.rng.gen_range(1..=product_count as i64);
            let rating = self.rng.gen_range(catalog::RATING_RANGE);
            rows.push(vec![
                Value::Int(id),
                Value::Int(user_id),
                Value::Int(product_id),
                Value::Int(rating),
                Value::Text(format!("rated {} of 5", rating)),
                Value::Timestamp(self.random_instant(365)),
            ]);
        }
        rows
    }

    fn wishlists_and_carts(
        &mut self,
        user_ids: &[i64],
        product_count: usize,
    ) -> (Vec<Vec<Value>>, Vec<Vec<Value>>) {
        let mut wishlists = Vec::new();
        let mut carts = Vec::new();
        if product_count == 0 {
            return (wishlists, carts);
        }
        for &user_id in user_ids {
            if self.rng.gen_bool(0.5) {
                let product_id = self.rng.gen_range(1..=product_count as i64);
                wishlists.push(vec![
                    Value::Int(user_id),
                    Value::Int(product_id),
                    Value::Timestamp(self.random_instant(365)),
                ]);
            }
            if self.rng.gen_bool(0.3) {
                let product_id = self.rng.gen_range(1..=product_count as i64);
                let quantity: i64 = self.rng.gen_range(1..=3);
                carts.push(vec![Value::Int(user_id), Value::Int(product_id), Value::Int(quantity)]);
            }
        }
        (wishlists, carts)
    }
}

/// Generates a store from the given configuration
pub fn seed_store(config: SeedConfig) -> StoreResult<MemoryStore> {
    SeedGenerator::new(config)?.generate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TableSource;

    fn small() -> SeedConfig {
        SeedConfig {
            seed: 7,
            users: 10,
            products: 8,
            orders: 25,
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = seed_store(small()).unwrap();
        let b = seed_store(small()).unwrap();
        for table in a.table_names() {
            assert_eq!(
                a.scan(&table).unwrap().fingerprint(),
                b.scan(&table).unwrap().fingerprint(),
                "table {} differs",
                table
            );
        }
    }

    #[test]
    fn test_different_seed_differs() {
        let a = seed_store(small()).unwrap();
        let b = seed_store(SeedConfig { seed: 8, ..small() }).unwrap();
        assert_ne!(
            a.scan("orders").unwrap().fingerprint(),
            b.scan("orders").unwrap().fingerprint()
        );
    }

    #[test]
    fn test_sizes_respected() {
        let store = seed_store(small()).unwrap();
        assert_eq!(store.row_count("users"), 10);
        assert_eq!(store.row_count("products"), 8);
        assert_eq!(store.row_count("orders"), 25);
        assert_eq!(store.row_count("categories"), CATEGORY_TREE.len());
        assert!(store.row_count("order_items") >= 25);
    }

    #[test]
    fn test_order_total_matches_items() {
        let store = seed_store(small()).unwrap();
        let orders = store.table("orders").unwrap();
        let items = store.table("order_items").unwrap();

        for i in 0..orders.len() {
            let order_id = orders.value(i, "id").unwrap().clone();
            let mut sum = Decimal::ZERO;
            for j in 0..items.len() {
                if items.value(j, "order_id") == Some(&order_id) {
                    let qty = items.value(j, "quantity").unwrap().as_decimal().unwrap();
                    let price = items.value(j, "unit_price").unwrap().as_decimal().unwrap();
                    sum += qty * price;
                }
            }
            assert_eq!(orders.value(i, "total_amount"), Some(&Value::Decimal(sum)));
        }
    }
}
