//! takatrack - waste-collection backend
//!
//! Tracks a single collection vehicle in real time and keeps every
//! collection point scheduled a few days ahead.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Collection points, the collector, schedules, bins and recycling records
//! - [`storage`] - Persistence (SQLite and in-memory)
//! - [`broadcast`] - Subscriber registry and event fan-out
//! - [`tracking`] - Live collector position
//! - [`scheduler`] - Schedule generation and the daily trigger
//! - [`server`] - REST and WebSocket surface
//!
//! # Example
//!
//! ```no_run
//! use takatrack::config::Config;
//! use takatrack::server::Server;
//! use takatrack::storage::create_sqlite_store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = create_sqlite_store(&config.database.sqlite_path)?;
//!     let server = Server::new(config, store)?;
//!     server.start_with_shutdown(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod tracking;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::broadcast::{Broadcaster, Event, Subscription};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, TakatrackErrorTrait};
    pub use crate::models::{
        CollectionPoint, CollectionSchedule, Collector, RecyclingRecord, ScheduleStatus, WasteBin,
    };
    pub use crate::scheduler::{GenerationReport, ScheduleGenerator, ScheduleTrigger};
    pub use crate::storage::{SharedStore, WasteStore};
    pub use crate::tracking::LocationTracker;
}

// Direct re-exports for convenience
pub use error::{Error, Result};
