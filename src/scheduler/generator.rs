//! Automatic collection schedule generation
//!
//! For every collection point the generator makes sure a schedule exists
//! `horizon_days` ahead. Each point is its own unit of work: a storage
//! failure for one point is recorded and the run moves on.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;

use crate::broadcast::{Broadcaster, Event};
use crate::error::Result;
use crate::models::{CollectionSchedule, ScheduleStatus};
use crate::storage::SharedStore;

use super::error::SchedulerError;

/// Default number of days ahead a schedule is created for
pub const DEFAULT_HORIZON_DAYS: i64 = 3;

/// Largest accepted horizon
pub const MAX_HORIZON_DAYS: i64 = 365;

/// A point whose schedule could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointFailure {
    pub point_id: i64,
    pub error: String,
}

/// Outcome of one generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    /// Schedules created by this run
    pub created: Vec<CollectionSchedule>,

    /// Points that already had a schedule on the target day
    pub skipped: usize,

    /// Points whose insert failed
    pub failures: Vec<PointFailure>,
}

impl GenerationReport {
    /// Number of points examined
    pub fn points_examined(&self) -> usize {
        self.created.len() + self.skipped + self.failures.len()
    }

    /// True when every point was handled without error
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Creates future schedules for all collection points
pub struct ScheduleGenerator {
    store: SharedStore,
    broadcaster: Arc<Broadcaster>,
}

impl ScheduleGenerator {
    pub fn new(store: SharedStore, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Ensure every point has a schedule `horizon_days` from now
    pub fn ensure_schedules(&self, horizon_days: i64) -> Result<GenerationReport> {
        self.ensure_schedules_at(Utc::now(), horizon_days)
    }

    /// Same as [`ensure_schedules`](Self::ensure_schedules) with an explicit clock
    pub fn ensure_schedules_at(
        &self,
        now: DateTime<Utc>,
        horizon_days: i64,
    ) -> Result<GenerationReport> {
        if !(0..=MAX_HORIZON_DAYS).contains(&horizon_days) {
            return Err(SchedulerError::invalid_horizon(horizon_days).into());
        }

        // Stored timestamps keep microseconds; the reported and published
        // schedule must match the persisted row.
        let target = (now + Duration::days(horizon_days)).trunc_subsecs(6);
        let point_ids = self.store.point_ids()?;
        let mut report = GenerationReport::default();

        for point_id in point_ids {
            match self
                .store
                .insert_schedule_if_absent(point_id, target, &ScheduleStatus::Scheduled)
            {
                Ok(Some(schedule)) => {
                    self.broadcaster.publish(Event::NewSchedule(schedule.clone()));
                    report.created.push(schedule);
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(point_id, error = %e, "Failed to create schedule for point");
                    report.failures.push(PointFailure {
                        point_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            target_day = %target.date_naive(),
            created = report.created.len(),
            skipped = report.skipped,
            failed = report.failures.len(),
            "Automated collection schedules updated"
        );

        Ok(report)
    }
}
