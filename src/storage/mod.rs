//! Persistence for collection points, schedules, the collector, waste bins
//! and recycling records
//!
//! All records live in one SQLite database. The [`repository`] module
//! defines the [`WasteStore`] handle that the rest of the crate is written
//! against; [`seed`] fills a store with demo data.

pub mod repository;
pub mod seed;

pub use repository::{
    collection_day, create_memory_store, create_sqlite_store, MemoryStore, SharedStore,
    SqliteStore, WasteStore,
};
pub use seed::{seed_demo_data, SeedSummary};
