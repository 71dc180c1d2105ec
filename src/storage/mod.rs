//! Row store subsystem for storeql
//!
//! Holds the e-commerce tables the engine reads from. The store is populated
//! once (from fixtures or the seeded generator) and is read-only afterwards.
//!
//! # Design Principles
//!
//! - Fixed catalog (column order = scan order)
//! - Insertion order preserved by scans
//! - Typed values checked on insert
//! - Shareable across threads without locking

pub mod catalog;
mod errors;
mod integrity;
mod loader;
mod memory;
mod seed;

pub use catalog::{table_def, TableDef, CATALOG, RATING_RANGE};
pub use errors::{StoreError, StoreResult};
pub use integrity::check_store;
pub use loader::FixtureLoader;
pub use memory::{MemoryStore, TableSource};
pub use seed::{seed_store, SeedConfig, SeedGenerator};
