//! Demo data for local development

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::error::Result;
use crate::models::{NewCollectionPoint, ScheduleStatus};

use super::repository::WasteStore;

const DEMO_POINTS: [(&str, f64, f64); 5] = [
    ("Westlands Pickup Station", -1.264, 36.812),
    ("Kilimani Waste Yard", -1.292, 36.785),
    ("Karen Market", -1.326, 36.720),
    ("Eastleigh Dump Site", -1.283, 36.857),
    ("CBD Collection Hub", -1.286, 36.817),
];

const DEMO_COLLECTOR: (f64, f64) = (-1.280, 36.815);

/// Counts of seeded records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub points: usize,
    pub schedules: usize,
}

/// Wipe the store and load the demo points, collector and schedules
pub fn seed_demo_data(store: &dyn WasteStore, now: DateTime<Utc>) -> Result<SeedSummary> {
    let now = now.trunc_subsecs(6);
    store.clear()?;

    let mut point_ids = Vec::with_capacity(DEMO_POINTS.len());
    for (name, latitude, longitude) in DEMO_POINTS {
        let point = store.insert_point(&NewCollectionPoint {
            name: name.to_string(),
            latitude,
            longitude,
        })?;
        point_ids.push(point.id);
    }

    store.upsert_collector(DEMO_COLLECTOR.0, DEMO_COLLECTOR.1, now)?;

    let offsets = [
        (Duration::days(1), ScheduleStatus::Scheduled),
        (Duration::days(2), ScheduleStatus::InProgress),
        (Duration::days(3), ScheduleStatus::Completed),
        (Duration::hours(10), ScheduleStatus::Scheduled),
        (Duration::days(1) + Duration::hours(5), ScheduleStatus::Scheduled),
    ];

    let mut schedules = 0;
    for (point_id, (offset, status)) in point_ids.iter().zip(offsets) {
        if store
            .insert_schedule_if_absent(*point_id, now + offset, &status)?
            .is_some()
        {
            schedules += 1;
        }
    }

    tracing::info!(points = point_ids.len(), schedules, "Seeded demo data");

    Ok(SeedSummary {
        points: point_ids.len(),
        schedules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::{MemoryStore, SqliteStore};

    #[test]
    fn test_seed_replaces_existing_data() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();

        seed_demo_data(&store, now).unwrap();
        let summary = seed_demo_data(&store, now).unwrap();

        assert_eq!(summary, SeedSummary { points: 5, schedules: 5 });
        assert_eq!(store.list_points().unwrap().len(), 5);
        assert_eq!(store.collector_count().unwrap(), 1);
    }

    #[test]
    fn test_seed_statuses() {
        let store = MemoryStore::new();
        seed_demo_data(&store, Utc::now()).unwrap();

        let statuses: Vec<_> = store
            .list_schedules()
            .unwrap()
            .into_iter()
            .map(|s| s.status)
            .collect();
        assert!(statuses.contains(&ScheduleStatus::InProgress));
        assert!(statuses.contains(&ScheduleStatus::Completed));
    }
}
