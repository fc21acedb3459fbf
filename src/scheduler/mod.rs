//! Collection schedule generation
//!
//! Every collection point should always have a pickup planned a few days
//! ahead. The [`ScheduleGenerator`] makes that true for all points in one
//! pass; the [`ScheduleTrigger`] runs it daily.
//!
//! # Architecture
//!
//! ```text
//!   ScheduleTrigger (daily, local time) ──┐
//!   POST /collection_points ──────────────┼──▶ ScheduleGenerator
//!   POST /assign_days, `assign-days` ─────┘          │
//!                                                    ▼
//!                                  WasteStore::insert_schedule_if_absent
//!                                                    │ created
//!                                                    ▼
//!                                     Broadcaster::publish(new_schedule)
//! ```
//!
//! Runs may overlap. At most one schedule exists per point and UTC
//! calendar day because the store's conditional insert is atomic, so a
//! second run on the same day only reports skips.
//!
//! # Quick Start
//!
//! ```ignore
//! use takatrack::scheduler::{ScheduleGenerator, DEFAULT_HORIZON_DAYS};
//!
//! let generator = ScheduleGenerator::new(store, broadcaster);
//! let report = generator.ensure_schedules(DEFAULT_HORIZON_DAYS)?;
//! println!("{} created, {} failed", report.created.len(), report.failures.len());
//! ```
//!
//! # Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `enabled` | true | Run the daily loop in `serve` |
//! | `run_time` | `00:00` | Local wall-clock time of the daily run |
//! | `horizon_days` | 3 | Days ahead each run plans for |
//! | `trigger_on_startup` | false | Also run once when the server starts |

pub mod error;
pub mod generator;
pub mod trigger;

pub use error::{SchedulerError, SchedulerResult};
pub use generator::{
    GenerationReport, PointFailure, ScheduleGenerator, DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS,
};
pub use trigger::{next_run_after, LastRun, ScheduleTrigger, TriggerConfig, TriggerStatus};
