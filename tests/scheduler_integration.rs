//! Integration tests for schedule generation against a real database
//!
//! These tests verify:
//! - Idempotence across runs and across store reopen
//! - The day-keyed uniqueness of generated schedules
//! - Event delivery to subscribers registered through the tracker

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use takatrack::broadcast::{Broadcaster, Event};
use takatrack::models::{NewCollectionPoint, ScheduleStatus};
use takatrack::scheduler::{ScheduleGenerator, ScheduleTrigger, TriggerConfig};
use takatrack::storage::{seed_demo_data, SharedStore, SqliteStore, WasteStore};
use takatrack::tracking::LocationTracker;
use tempfile::TempDir;

fn open(dir: &TempDir) -> SharedStore {
    Arc::new(SqliteStore::new(dir.path().join("schedules.db")).unwrap())
}

fn add_point(store: &SharedStore, name: &str) -> i64 {
    store
        .insert_point(&NewCollectionPoint {
            name: name.to_string(),
            latitude: -1.29,
            longitude: 36.82,
        })
        .unwrap()
        .id
}

// ============================================================================
// Generation
// ============================================================================

#[test]
fn test_generation_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 20, 23, 59, 0).unwrap();

    {
        let store = open(&dir);
        add_point(&store, "CBD Collection Hub");
        let generator = ScheduleGenerator::new(store, Arc::new(Broadcaster::new()));
        assert_eq!(generator.ensure_schedules_at(now, 3).unwrap().created.len(), 1);
    }

    let store = open(&dir);
    let generator = ScheduleGenerator::new(store.clone(), Arc::new(Broadcaster::new()));
    let report = generator
        .ensure_schedules_at(now + Duration::seconds(30), 3)
        .unwrap();

    // Same UTC day, so nothing new even though the clock moved
    assert!(report.created.is_empty());
    assert_eq!(report.skipped, 1);
    assert_eq!(store.list_schedules().unwrap().len(), 1);
}

#[test]
fn test_generation_after_midnight_creates_next_day() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    add_point(&store, "Karen Market");
    let generator = ScheduleGenerator::new(store.clone(), Arc::new(Broadcaster::new()));

    let before = Utc.with_ymd_and_hms(2024, 5, 20, 23, 59, 0).unwrap();
    generator.ensure_schedules_at(before, 3).unwrap();
    let report = generator
        .ensure_schedules_at(before + Duration::minutes(2), 3)
        .unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(
        report.created[0].collection_date.date_naive(),
        chrono::NaiveDate::from_ymd_opt(2024, 5, 24).unwrap()
    );
}

#[test]
fn test_seeded_points_get_generated_schedules() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let now = Utc::now();
    seed_demo_data(store.as_ref(), now).unwrap();

    let generator = ScheduleGenerator::new(store.clone(), Arc::new(Broadcaster::new()));
    let report = generator.ensure_schedules_at(now, 7).unwrap();

    assert_eq!(report.created.len(), 5);
    assert!(report
        .created
        .iter()
        .all(|s| s.status == ScheduleStatus::Scheduled));
    assert_eq!(store.list_schedules().unwrap().len(), 10);
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_subscriber_sees_replay_then_new_schedules() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let broadcaster = Arc::new(Broadcaster::new());
    let tracker = LocationTracker::new(store.clone(), broadcaster.clone());
    let generator = Arc::new(ScheduleGenerator::new(store.clone(), broadcaster.clone()));

    add_point(&store, "Westlands Pickup Station");
    let collector = tracker.report_location(Some(-1.264), Some(36.812)).await.unwrap();

    let mut subscription = tracker.subscribe().await.unwrap();
    let trigger = ScheduleTrigger::new(TriggerConfig::default(), generator).unwrap();
    let report = trigger.run_now().await.unwrap();

    assert_eq!(subscription.recv().await, Some(Event::CollectorUpdate(collector)));
    assert_eq!(
        subscription.recv().await,
        Some(Event::NewSchedule(report.created[0].clone()))
    );
    assert_eq!(subscription.try_recv(), None);
}
