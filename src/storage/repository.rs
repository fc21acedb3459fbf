//! Repository Pattern for Database Abstraction
//!
//! [`WasteStore`] is the persistence handle injected into the tracker and
//! the schedule generator. Two implementations are provided:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          LocationTracker / ScheduleGenerator / API          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   WasteStore (trait)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                     │
//!                    ▼                     ▼
//!          ┌─────────────────┐   ┌─────────────────┐
//!          │   SqliteStore   │   │   MemoryStore   │
//!          └─────────────────┘   └─────────────────┘
//! ```
//!
//! Both implementations make the two contended writes atomic: the
//! collector upsert is keyed by [`COLLECTOR_ID`], and the generator's
//! schedule insert is conditional on `(point_id, collection day)` being
//! free.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Error, PersistenceContext, Result};
use crate::models::{
    CollectionPoint, CollectionSchedule, Collector, NewCollectionPoint, NewRecyclingRecord,
    NewWasteBin, RecyclingRecord, ScheduleStatus, WasteBin, WasteBinUpdate, COLLECTOR_ID,
};

// ============================================================================
// Repository Trait
// ============================================================================

/// Persistence operations for points, schedules, the collector, bins and
/// recycling records
pub trait WasteStore: Send + Sync {
    /// Insert a new collection point
    fn insert_point(&self, point: &NewCollectionPoint) -> Result<CollectionPoint>;

    /// All collection points with their schedules, ordered by id
    fn list_points(&self) -> Result<Vec<CollectionPoint>>;

    /// One collection point with its schedules
    fn get_point(&self, id: i64) -> Result<Option<CollectionPoint>>;

    /// Ids of all collection points, ordered
    fn point_ids(&self) -> Result<Vec<i64>>;

    /// Delete a point and, by cascade, its schedules
    fn delete_point(&self, id: i64) -> Result<bool>;

    /// Insert a schedule unless the point already has one on the same day.
    ///
    /// Returns `None` when an existing schedule claimed that day.
    fn insert_schedule_if_absent(
        &self,
        point_id: i64,
        collection_date: DateTime<Utc>,
        status: &ScheduleStatus,
    ) -> Result<Option<CollectionSchedule>>;

    /// All schedules ordered by id
    fn list_schedules(&self) -> Result<Vec<CollectionSchedule>>;

    /// Schedules belonging to one point
    fn schedules_for_point(&self, point_id: i64) -> Result<Vec<CollectionSchedule>>;

    /// Change the status of a schedule
    fn update_schedule_status(
        &self,
        id: i64,
        status: &ScheduleStatus,
    ) -> Result<Option<CollectionSchedule>>;

    /// Delete a schedule by id
    fn delete_schedule(&self, id: i64) -> Result<bool>;

    /// Create or overwrite the singleton collector position
    fn upsert_collector(&self, latitude: f64, longitude: f64, at: DateTime<Utc>)
        -> Result<Collector>;

    /// The singleton collector, if a position was ever reported
    fn get_collector(&self) -> Result<Option<Collector>>;

    /// Number of collector rows (always 0 or 1)
    fn collector_count(&self) -> Result<usize>;

    /// Insert a new waste bin
    fn insert_bin(&self, bin: &NewWasteBin) -> Result<WasteBin>;

    /// All waste bins ordered by id
    fn list_bins(&self) -> Result<Vec<WasteBin>>;

    /// Apply a partial update; `None` when the bin does not exist
    fn update_bin(&self, id: i64, update: &WasteBinUpdate) -> Result<Option<WasteBin>>;

    /// Delete a waste bin by id
    fn delete_bin(&self, id: i64) -> Result<bool>;

    /// Insert a recycling record
    fn insert_recycling_record(&self, record: &NewRecyclingRecord) -> Result<RecyclingRecord>;

    /// All recycling records ordered by id
    fn list_recycling_records(&self) -> Result<Vec<RecyclingRecord>>;

    /// Remove every record
    fn clear(&self) -> Result<()>;
}

/// Thread-safe shared store handle
pub type SharedStore = Arc<dyn WasteStore>;

/// UTC calendar day used as the uniqueness key for schedules
pub fn collection_day(date: DateTime<Utc>) -> NaiveDate {
    date.date_naive()
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`WasteStore`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection; each
/// trait method runs as one critical section.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to configure SQLite journal")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            r#"
                PRAGMA foreign_keys = ON;

                CREATE TABLE IF NOT EXISTS collection_points (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    latitude REAL NOT NULL,
                    longitude REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS collectors (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    latitude REAL,
                    longitude REAL,
                    last_updated TEXT
                );

                CREATE TABLE IF NOT EXISTS collection_schedules (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    point_id INTEGER NOT NULL
                        REFERENCES collection_points(id) ON DELETE CASCADE,
                    collection_date TEXT NOT NULL,
                    collection_day TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'scheduled'
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_schedules_point_day
                    ON collection_schedules(point_id, collection_day);

                CREATE TABLE IF NOT EXISTS waste_bins (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    location TEXT NOT NULL,
                    capacity REAL NOT NULL,
                    fill_level REAL NOT NULL DEFAULT 0,
                    status TEXT NOT NULL DEFAULT 'active'
                );

                CREATE TABLE IF NOT EXISTS recycling_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    material TEXT NOT NULL,
                    weight REAL NOT NULL,
                    date TEXT NOT NULL,
                    collected_by INTEGER NOT NULL
                );
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    fn load_schedules(conn: &Connection, point_id: Option<i64>) -> Result<Vec<CollectionSchedule>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, point_id, collection_date, status FROM collection_schedules
                 WHERE ?1 IS NULL OR point_id = ?1
                 ORDER BY id",
            )
            .context("Failed to prepare schedule query")?;

        let schedules = stmt
            .query_map(params![point_id], schedule_from_row)
            .context("Failed to query schedules")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read schedule row")?;

        Ok(schedules)
    }

    fn load_points(conn: &Connection, id: Option<i64>) -> Result<Vec<CollectionPoint>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, name, latitude, longitude FROM collection_points
                 WHERE ?1 IS NULL OR id = ?1
                 ORDER BY id",
            )
            .context("Failed to prepare point query")?;

        let mut points = stmt
            .query_map(params![id], |row| {
                Ok(CollectionPoint {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    latitude: row.get(2)?,
                    longitude: row.get(3)?,
                    schedules: Vec::new(),
                })
            })
            .context("Failed to query collection points")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read collection point row")?;

        let mut by_point: HashMap<i64, Vec<CollectionSchedule>> = HashMap::new();
        for schedule in Self::load_schedules(conn, id)? {
            by_point.entry(schedule.point_id).or_default().push(schedule);
        }
        for point in &mut points {
            point.schedules = by_point.remove(&point.id).unwrap_or_default();
        }

        Ok(points)
    }

    fn load_bins(conn: &Connection, id: Option<i64>) -> Result<Vec<WasteBin>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, location, capacity, fill_level, status FROM waste_bins
                 WHERE ?1 IS NULL OR id = ?1
                 ORDER BY id",
            )
            .context("Failed to prepare bin query")?;

        let bins = stmt
            .query_map(params![id], |row| {
                Ok(WasteBin {
                    id: row.get(0)?,
                    location: row.get(1)?,
                    capacity: row.get(2)?,
                    fill_level: row.get(3)?,
                    status: row.get(4)?,
                })
            })
            .context("Failed to query waste bins")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read waste bin row")?;

        Ok(bins)
    }

    fn load_schedule(conn: &Connection, id: i64) -> Result<Option<CollectionSchedule>> {
        conn.query_row(
            "SELECT id, point_id, collection_date, status FROM collection_schedules WHERE id = ?1",
            params![id],
            schedule_from_row,
        )
        .optional()
        .context("Failed to load schedule")
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<CollectionSchedule> {
    let raw_date: String = row.get(2)?;
    Ok(CollectionSchedule {
        id: row.get(0)?,
        point_id: row.get(1)?,
        collection_date: parse_timestamp(2, &raw_date)?,
        status: ScheduleStatus::from(row.get::<_, String>(3)?),
    })
}

impl WasteStore for SqliteStore {
    fn insert_point(&self, point: &NewCollectionPoint) -> Result<CollectionPoint> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO collection_points (name, latitude, longitude) VALUES (?1, ?2, ?3)",
            params![point.name, point.latitude, point.longitude],
        )
        .context("Failed to insert collection point")?;

        Ok(CollectionPoint {
            id: conn.last_insert_rowid(),
            name: point.name.clone(),
            latitude: point.latitude,
            longitude: point.longitude,
            schedules: Vec::new(),
        })
    }

    fn list_points(&self) -> Result<Vec<CollectionPoint>> {
        Self::load_points(&self.conn(), None)
    }

    fn get_point(&self, id: i64) -> Result<Option<CollectionPoint>> {
        Ok(Self::load_points(&self.conn(), Some(id))?.pop())
    }

    fn point_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id FROM collection_points ORDER BY id")
            .context("Failed to prepare point id query")?;

        let ids = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to query point ids")?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .context("Failed to read point id")?;

        Ok(ids)
    }

    fn delete_point(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM collection_points WHERE id = ?1", params![id])
            .context("Failed to delete collection point")?;
        Ok(deleted > 0)
    }

    fn insert_schedule_if_absent(
        &self,
        point_id: i64,
        collection_date: DateTime<Utc>,
        status: &ScheduleStatus,
    ) -> Result<Option<CollectionSchedule>> {
        let conn = self.conn();
        let inserted = conn
            .execute(
                r#"
                INSERT INTO collection_schedules (point_id, collection_date, collection_day, status)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(point_id, collection_day) DO NOTHING
                "#,
                params![
                    point_id,
                    format_timestamp(collection_date),
                    collection_day(collection_date).to_string(),
                    status.as_str(),
                ],
            )
            .context("Failed to insert collection schedule")?;

        if inserted == 0 {
            return Ok(None);
        }

        Ok(Some(CollectionSchedule {
            id: conn.last_insert_rowid(),
            point_id,
            collection_date,
            status: status.clone(),
        }))
    }

    fn list_schedules(&self) -> Result<Vec<CollectionSchedule>> {
        Self::load_schedules(&self.conn(), None)
    }

    fn schedules_for_point(&self, point_id: i64) -> Result<Vec<CollectionSchedule>> {
        Self::load_schedules(&self.conn(), Some(point_id))
    }

    fn update_schedule_status(
        &self,
        id: i64,
        status: &ScheduleStatus,
    ) -> Result<Option<CollectionSchedule>> {
        let conn = self.conn();
        let updated = conn
            .execute(
                "UPDATE collection_schedules SET status = ?2 WHERE id = ?1",
                params![id, status.as_str()],
            )
            .context("Failed to update schedule status")?;

        if updated == 0 {
            return Ok(None);
        }
        Self::load_schedule(&conn, id)
    }

    fn delete_schedule(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM collection_schedules WHERE id = ?1", params![id])
            .context("Failed to delete schedule")?;
        Ok(deleted > 0)
    }

    fn upsert_collector(
        &self,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Result<Collector> {
        self.conn()
            .execute(
                r#"
                INSERT INTO collectors (id, latitude, longitude, last_updated)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    last_updated = excluded.last_updated
                "#,
                params![COLLECTOR_ID, latitude, longitude, format_timestamp(at)],
            )
            .context("Failed to upsert collector")?;

        Ok(Collector {
            id: COLLECTOR_ID,
            latitude: Some(latitude),
            longitude: Some(longitude),
            last_updated: Some(at),
        })
    }

    fn get_collector(&self) -> Result<Option<Collector>> {
        self.conn()
            .query_row(
                "SELECT id, latitude, longitude, last_updated FROM collectors WHERE id = ?1",
                params![COLLECTOR_ID],
                |row| {
                    let last_updated = row
                        .get::<_, Option<String>>(3)?
                        .map(|raw| parse_timestamp(3, &raw))
                        .transpose()?;
                    Ok(Collector {
                        id: row.get(0)?,
                        latitude: row.get(1)?,
                        longitude: row.get(2)?,
                        last_updated,
                    })
                },
            )
            .optional()
            .context("Failed to load collector")
    }

    fn collector_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM collectors", [], |row| row.get(0))
            .context("Failed to count collectors")?;
        Ok(count as usize)
    }

    fn insert_bin(&self, bin: &NewWasteBin) -> Result<WasteBin> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO waste_bins (location, capacity, fill_level, status) VALUES (?1, ?2, ?3, ?4)",
            params![bin.location, bin.capacity, bin.fill_level, bin.status],
        )
        .context("Failed to insert waste bin")?;

        Ok(WasteBin {
            id: conn.last_insert_rowid(),
            location: bin.location.clone(),
            capacity: bin.capacity,
            fill_level: bin.fill_level,
            status: bin.status.clone(),
        })
    }

    fn list_bins(&self) -> Result<Vec<WasteBin>> {
        Self::load_bins(&self.conn(), None)
    }

    fn update_bin(&self, id: i64, update: &WasteBinUpdate) -> Result<Option<WasteBin>> {
        let conn = self.conn();
        let Some(mut bin) = Self::load_bins(&conn, Some(id))?.pop() else {
            return Ok(None);
        };
        update.apply(&mut bin);

        conn.execute(
            "UPDATE waste_bins SET location = ?2, capacity = ?3, fill_level = ?4, status = ?5
             WHERE id = ?1",
            params![id, bin.location, bin.capacity, bin.fill_level, bin.status],
        )
        .context("Failed to update waste bin")?;

        Ok(Some(bin))
    }

    fn delete_bin(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM waste_bins WHERE id = ?1", params![id])
            .context("Failed to delete waste bin")?;
        Ok(deleted > 0)
    }

    fn insert_recycling_record(&self, record: &NewRecyclingRecord) -> Result<RecyclingRecord> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO recycling_records (material, weight, date, collected_by)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.material,
                record.weight,
                record.date.to_string(),
                record.collected_by
            ],
        )
        .context("Failed to insert recycling record")?;

        Ok(RecyclingRecord {
            id: conn.last_insert_rowid(),
            material: record.material.clone(),
            weight: record.weight,
            date: record.date,
            collected_by: record.collected_by,
        })
    }

    fn list_recycling_records(&self) -> Result<Vec<RecyclingRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, material, weight, date, collected_by FROM recycling_records ORDER BY id",
            )
            .context("Failed to prepare recycling query")?;

        let records = stmt
            .query_map([], |row| {
                let raw_date: String = row.get(3)?;
                Ok(RecyclingRecord {
                    id: row.get(0)?,
                    material: row.get(1)?,
                    weight: row.get(2)?,
                    date: parse_date(3, &raw_date)?,
                    collected_by: row.get(4)?,
                })
            })
            .context("Failed to query recycling records")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read recycling record row")?;

        Ok(records)
    }

    fn clear(&self) -> Result<()> {
        self.conn()
            .execute_batch(
                "DELETE FROM collection_schedules;
                 DELETE FROM collection_points;
                 DELETE FROM collectors;
                 DELETE FROM waste_bins;
                 DELETE FROM recycling_records;",
            )
            .context("Failed to clear tables")?;
        Ok(())
    }
}

// ============================================================================
// In-memory Implementation (for testing)
// ============================================================================

#[derive(Default)]
struct MemoryState {
    points: BTreeMap<i64, NewCollectionPoint>,
    schedules: BTreeMap<i64, CollectionSchedule>,
    collector: Option<Collector>,
    bins: BTreeMap<i64, WasteBin>,
    recycling: BTreeMap<i64, RecyclingRecord>,
    next_point_id: i64,
    next_schedule_id: i64,
    next_bin_id: i64,
    next_recycling_id: i64,
    failing_points: HashSet<i64>,
}

impl MemoryState {
    fn point(&self, id: i64) -> Option<CollectionPoint> {
        self.points.get(&id).map(|p| CollectionPoint {
            id,
            name: p.name.clone(),
            latitude: p.latitude,
            longitude: p.longitude,
            schedules: self.schedules_for(id),
        })
    }

    fn schedules_for(&self, point_id: i64) -> Vec<CollectionSchedule> {
        self.schedules
            .values()
            .filter(|s| s.point_id == point_id)
            .cloned()
            .collect()
    }
}

/// In-memory implementation of [`WasteStore`]
///
/// Useful for testing without database dependencies. Schedule writes for
/// chosen points can be made to fail via [`MemoryStore::fail_schedules_for`].
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every schedule insert for `point_id` fail with a storage error
    pub fn fail_schedules_for(&self, point_id: i64) {
        self.write().failing_points.insert(point_id);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WasteStore for MemoryStore {
    fn insert_point(&self, point: &NewCollectionPoint) -> Result<CollectionPoint> {
        let mut state = self.write();
        state.next_point_id += 1;
        let id = state.next_point_id;
        state.points.insert(id, point.clone());

        Ok(CollectionPoint {
            id,
            name: point.name.clone(),
            latitude: point.latitude,
            longitude: point.longitude,
            schedules: Vec::new(),
        })
    }

    fn list_points(&self) -> Result<Vec<CollectionPoint>> {
        let state = self.read();
        Ok(state.points.keys().filter_map(|id| state.point(*id)).collect())
    }

    fn get_point(&self, id: i64) -> Result<Option<CollectionPoint>> {
        Ok(self.read().point(id))
    }

    fn point_ids(&self) -> Result<Vec<i64>> {
        Ok(self.read().points.keys().copied().collect())
    }

    fn delete_point(&self, id: i64) -> Result<bool> {
        let mut state = self.write();
        if state.points.remove(&id).is_none() {
            return Ok(false);
        }
        state.schedules.retain(|_, s| s.point_id != id);
        Ok(true)
    }

    fn insert_schedule_if_absent(
        &self,
        point_id: i64,
        collection_date: DateTime<Utc>,
        status: &ScheduleStatus,
    ) -> Result<Option<CollectionSchedule>> {
        let mut state = self.write();

        if state.failing_points.contains(&point_id) {
            return Err(Error::persistence(
                "Failed to insert collection schedule",
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
                    Some(format!("injected failure for point {point_id}")),
                ),
            ));
        }
        if !state.points.contains_key(&point_id) {
            return Err(Error::not_found("collection point", point_id));
        }

        let day = collection_day(collection_date);
        let taken = state
            .schedules
            .values()
            .any(|s| s.point_id == point_id && collection_day(s.collection_date) == day);
        if taken {
            return Ok(None);
        }

        state.next_schedule_id += 1;
        let schedule = CollectionSchedule {
            id: state.next_schedule_id,
            point_id,
            collection_date,
            status: status.clone(),
        };
        state.schedules.insert(schedule.id, schedule.clone());
        Ok(Some(schedule))
    }

    fn list_schedules(&self) -> Result<Vec<CollectionSchedule>> {
        Ok(self.read().schedules.values().cloned().collect())
    }

    fn schedules_for_point(&self, point_id: i64) -> Result<Vec<CollectionSchedule>> {
        Ok(self.read().schedules_for(point_id))
    }

    fn update_schedule_status(
        &self,
        id: i64,
        status: &ScheduleStatus,
    ) -> Result<Option<CollectionSchedule>> {
        let mut state = self.write();
        Ok(state.schedules.get_mut(&id).map(|s| {
            s.status = status.clone();
            s.clone()
        }))
    }

    fn delete_schedule(&self, id: i64) -> Result<bool> {
        Ok(self.write().schedules.remove(&id).is_some())
    }

    fn upsert_collector(
        &self,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Result<Collector> {
        let collector = Collector {
            id: COLLECTOR_ID,
            latitude: Some(latitude),
            longitude: Some(longitude),
            last_updated: Some(at),
        };
        self.write().collector = Some(collector.clone());
        Ok(collector)
    }

    fn get_collector(&self) -> Result<Option<Collector>> {
        Ok(self.read().collector.clone())
    }

    fn collector_count(&self) -> Result<usize> {
        Ok(usize::from(self.read().collector.is_some()))
    }

    fn insert_bin(&self, bin: &NewWasteBin) -> Result<WasteBin> {
        let mut state = self.write();
        state.next_bin_id += 1;
        let created = WasteBin {
            id: state.next_bin_id,
            location: bin.location.clone(),
            capacity: bin.capacity,
            fill_level: bin.fill_level,
            status: bin.status.clone(),
        };
        state.bins.insert(created.id, created.clone());
        Ok(created)
    }

    fn list_bins(&self) -> Result<Vec<WasteBin>> {
        Ok(self.read().bins.values().cloned().collect())
    }

    fn update_bin(&self, id: i64, update: &WasteBinUpdate) -> Result<Option<WasteBin>> {
        let mut state = self.write();
        Ok(state.bins.get_mut(&id).map(|bin| {
            update.apply(bin);
            bin.clone()
        }))
    }

    fn delete_bin(&self, id: i64) -> Result<bool> {
        Ok(self.write().bins.remove(&id).is_some())
    }

    fn insert_recycling_record(&self, record: &NewRecyclingRecord) -> Result<RecyclingRecord> {
        let mut state = self.write();
        state.next_recycling_id += 1;
        let created = RecyclingRecord {
            id: state.next_recycling_id,
            material: record.material.clone(),
            weight: record.weight,
            date: record.date,
            collected_by: record.collected_by,
        };
        state.recycling.insert(created.id, created.clone());
        Ok(created)
    }

    fn list_recycling_records(&self) -> Result<Vec<RecyclingRecord>> {
        Ok(self.read().recycling.values().cloned().collect())
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.write();
        state.points.clear();
        state.schedules.clear();
        state.collector = None;
        state.bins.clear();
        state.recycling.clear();
        Ok(())
    }
}

// ============================================================================
// Shared Store Constructors
// ============================================================================

/// Create a shared SQLite store
pub fn create_sqlite_store(path: impl AsRef<Path>) -> Result<SharedStore> {
    Ok(Arc::new(SqliteStore::new(path)?))
}

/// Create a shared in-memory store
pub fn create_memory_store() -> SharedStore {
    Arc::new(MemoryStore::new())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    // Helper to create test stores
    fn create_test_stores() -> Vec<Box<dyn WasteStore>> {
        vec![
            Box::new(SqliteStore::in_memory().unwrap()),
            Box::new(MemoryStore::new()),
        ]
    }

    fn cbd_hub() -> NewCollectionPoint {
        NewCollectionPoint {
            name: "CBD Hub".to_string(),
            latitude: -1.286,
            longitude: 36.817,
        }
    }

    fn gate_bin() -> NewWasteBin {
        NewWasteBin::from_parts(Some("Gate 4".to_string()), Some(240.0), None, None).unwrap()
    }

    fn plastic_record() -> NewRecyclingRecord {
        NewRecyclingRecord {
            material: "plastic".to_string(),
            weight: 12.5,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            collected_by: 1,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_and_list_points() {
        for store in create_test_stores() {
            let created = store.insert_point(&cbd_hub()).unwrap();
            assert!(created.id > 0);

            let points = store.list_points().unwrap();
            assert_eq!(points.len(), 1);
            assert_eq!(points[0].name, "CBD Hub");
            assert!(points[0].schedules.is_empty());
            assert_eq!(store.point_ids().unwrap(), vec![created.id]);
        }
    }

    #[test]
    fn test_conditional_schedule_insert() {
        for store in create_test_stores() {
            let point = store.insert_point(&cbd_hub()).unwrap();

            let first = store
                .insert_schedule_if_absent(point.id, at(10, 8), &ScheduleStatus::Scheduled)
                .unwrap();
            assert!(first.is_some());

            // Same UTC day, different hour
            let second = store
                .insert_schedule_if_absent(point.id, at(10, 20), &ScheduleStatus::Scheduled)
                .unwrap();
            assert!(second.is_none());

            let next_day = store
                .insert_schedule_if_absent(point.id, at(11, 8), &ScheduleStatus::Scheduled)
                .unwrap();
            assert!(next_day.is_some());

            assert_eq!(store.schedules_for_point(point.id).unwrap().len(), 2);
        }
    }

    #[test]
    fn test_point_includes_schedules() {
        for store in create_test_stores() {
            let point = store.insert_point(&cbd_hub()).unwrap();
            let schedule = store
                .insert_schedule_if_absent(point.id, at(10, 0), &ScheduleStatus::Scheduled)
                .unwrap()
                .unwrap();

            let loaded = store.get_point(point.id).unwrap().unwrap();
            assert_eq!(loaded.schedules, vec![schedule]);
        }
    }

    #[test]
    fn test_delete_point_cascades() {
        for store in create_test_stores() {
            let point = store.insert_point(&cbd_hub()).unwrap();
            store
                .insert_schedule_if_absent(point.id, at(10, 0), &ScheduleStatus::Scheduled)
                .unwrap();

            assert!(store.delete_point(point.id).unwrap());
            assert!(store.schedules_for_point(point.id).unwrap().is_empty());
            assert!(store.list_schedules().unwrap().is_empty());
            assert!(!store.delete_point(point.id).unwrap());
        }
    }

    #[test]
    fn test_collector_upsert_keeps_single_row() {
        for store in create_test_stores() {
            assert!(store.get_collector().unwrap().is_none());

            let first = store.upsert_collector(-1.28, 36.81, at(1, 0)).unwrap();
            let second = store
                .upsert_collector(-1.29, 36.82, at(1, 0) + Duration::seconds(5))
                .unwrap();

            assert_eq!(first.id, second.id);
            assert_eq!(store.collector_count().unwrap(), 1);

            let loaded = store.get_collector().unwrap().unwrap();
            assert_eq!(loaded.latitude, Some(-1.29));
            assert_eq!(loaded.last_updated, second.last_updated);
        }
    }

    #[test]
    fn test_update_and_delete_schedule() {
        for store in create_test_stores() {
            let point = store.insert_point(&cbd_hub()).unwrap();
            let schedule = store
                .insert_schedule_if_absent(point.id, at(10, 0), &ScheduleStatus::Scheduled)
                .unwrap()
                .unwrap();

            let updated = store
                .update_schedule_status(schedule.id, &ScheduleStatus::Completed)
                .unwrap()
                .unwrap();
            assert_eq!(updated.status, ScheduleStatus::Completed);
            assert_eq!(updated.collection_date, schedule.collection_date);

            assert!(store
                .update_schedule_status(9999, &ScheduleStatus::Completed)
                .unwrap()
                .is_none());

            assert!(store.delete_schedule(schedule.id).unwrap());
            assert!(!store.delete_schedule(schedule.id).unwrap());
        }
    }

    #[test]
    fn test_schedule_for_missing_point_fails() {
        for store in create_test_stores() {
            let result =
                store.insert_schedule_if_absent(42, at(10, 0), &ScheduleStatus::Scheduled);
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_bin_lifecycle() {
        for store in create_test_stores() {
            let bin = store.insert_bin(&gate_bin()).unwrap();
            assert!(bin.id > 0);
            assert_eq!(bin.status, "active");

            let update = WasteBinUpdate {
                fill_level: Some(200.0),
                ..Default::default()
            };
            let updated = store.update_bin(bin.id, &update).unwrap().unwrap();
            assert_eq!(updated.fill_level, 200.0);
            assert_eq!(updated.location, bin.location);
            assert_eq!(store.list_bins().unwrap(), vec![updated]);

            assert!(store.update_bin(9999, &update).unwrap().is_none());
            assert!(store.delete_bin(bin.id).unwrap());
            assert!(!store.delete_bin(bin.id).unwrap());
            assert!(store.list_bins().unwrap().is_empty());
        }
    }

    #[test]
    fn test_recycling_records_keep_their_date() {
        for store in create_test_stores() {
            let created = store.insert_recycling_record(&plastic_record()).unwrap();
            let listed = store.list_recycling_records().unwrap();

            assert_eq!(listed, vec![created]);
            assert_eq!(listed[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        }
    }

    #[test]
    fn test_clear() {
        for store in create_test_stores() {
            let point = store.insert_point(&cbd_hub()).unwrap();
            store
                .insert_schedule_if_absent(point.id, at(10, 0), &ScheduleStatus::Scheduled)
                .unwrap();
            store.upsert_collector(0.0, 0.0, at(1, 0)).unwrap();
            store.insert_bin(&gate_bin()).unwrap();
            store.insert_recycling_record(&plastic_record()).unwrap();

            store.clear().unwrap();

            assert!(store.list_points().unwrap().is_empty());
            assert!(store.list_schedules().unwrap().is_empty());
            assert_eq!(store.collector_count().unwrap(), 0);
            assert!(store.list_bins().unwrap().is_empty());
            assert!(store.list_recycling_records().unwrap().is_empty());
        }
    }

    #[test]
    fn test_sqlite_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("takatrack.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.insert_point(&cbd_hub()).unwrap();
            store.upsert_collector(-1.28, 36.81, at(2, 0)).unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(reopened.list_points().unwrap().len(), 1);
        assert_eq!(
            reopened.get_collector().unwrap().unwrap().last_updated,
            Some(at(2, 0))
        );
    }

    #[test]
    fn test_memory_store_injected_failure() {
        let store = MemoryStore::new();
        let point = store.insert_point(&cbd_hub()).unwrap();
        store.fail_schedules_for(point.id);

        let err = store
            .insert_schedule_if_absent(point.id, at(10, 0), &ScheduleStatus::Scheduled)
            .unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }
}
