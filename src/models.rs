// Core data structures for takatrack

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed primary key of the one tracked collector
pub const COLLECTOR_ID: i64 = 1;

/// Fixed physical location where waste is gathered for pickup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPoint {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub schedules: Vec<CollectionSchedule>,
}

/// Validated input for a new collection point
#[derive(Debug, Clone, PartialEq)]
pub struct NewCollectionPoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl NewCollectionPoint {
    /// Build from possibly-missing request fields.
    ///
    /// Coordinates are checked for presence only, so `0.0` is accepted.
    pub fn from_parts(
        name: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> crate::Result<Self> {
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        match (name, latitude, longitude) {
            (Some(name), Some(latitude), Some(longitude)) => Ok(Self {
                name,
                latitude,
                longitude,
            }),
            _ => Err(crate::Error::validation("Missing name or coordinates")),
        }
    }
}

/// The tracked collector (vehicle/agent); one row per deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collector {
    pub id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Planned pickup for one collection point on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchedule {
    pub id: i64,
    pub point_id: i64,
    pub collection_date: DateTime<Utc>,
    pub status: ScheduleStatus,
}

/// Schedule lifecycle state.
///
/// Stored as free text; values outside the known set are kept verbatim
/// in [`ScheduleStatus::Other`] rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScheduleStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Other(String),
}

impl ScheduleStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Other(s) => s,
        }
    }

    /// Whether this is one of the known lifecycle values
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for ScheduleStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "scheduled" => Self::Scheduled,
            "in-progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for ScheduleStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ScheduleStatus> for String {
    fn from(status: ScheduleStatus) -> Self {
        match status {
            ScheduleStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status given to bins created without one
pub const DEFAULT_BIN_STATUS: &str = "active";

/// A physical waste bin and how full it is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteBin {
    pub id: i64,
    pub location: String,
    pub capacity: f64,
    pub fill_level: f64,
    pub status: String,
}

/// Validated input for a new waste bin
#[derive(Debug, Clone, PartialEq)]
pub struct NewWasteBin {
    pub location: String,
    pub capacity: f64,
    pub fill_level: f64,
    pub status: String,
}

impl NewWasteBin {
    /// Build from possibly-missing request fields.
    ///
    /// A blank location or a capacity that is absent or not positive is
    /// rejected. Fill level defaults to empty and status to `active`.
    pub fn from_parts(
        location: Option<String>,
        capacity: Option<f64>,
        fill_level: Option<f64>,
        status: Option<String>,
    ) -> crate::Result<Self> {
        let location = non_blank(location);
        let capacity = capacity.filter(|c| *c > 0.0);
        let (Some(location), Some(capacity)) = (location, capacity) else {
            return Err(crate::Error::validation("Location and capacity are required"));
        };

        let fill_level = fill_level.unwrap_or(0.0);
        check_fill_level(fill_level)?;

        Ok(Self {
            location,
            capacity,
            fill_level,
            status: non_blank(status).unwrap_or_else(|| DEFAULT_BIN_STATUS.to_string()),
        })
    }
}

/// Partial update of a waste bin; absent fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WasteBinUpdate {
    pub location: Option<String>,
    pub capacity: Option<f64>,
    pub fill_level: Option<f64>,
    pub status: Option<String>,
}

impl WasteBinUpdate {
    /// Reject values a bin can never hold
    pub fn validate(&self) -> crate::Result<()> {
        if matches!(&self.location, Some(l) if l.trim().is_empty()) {
            return Err(crate::Error::validation("location must not be blank"));
        }
        if matches!(self.capacity, Some(c) if c <= 0.0) {
            return Err(crate::Error::validation("capacity must be positive"));
        }
        if let Some(level) = self.fill_level {
            check_fill_level(level)?;
        }
        if matches!(&self.status, Some(s) if s.trim().is_empty()) {
            return Err(crate::Error::validation("status must not be blank"));
        }
        Ok(())
    }

    /// Apply to an existing bin
    pub fn apply(&self, bin: &mut WasteBin) {
        if let Some(location) = &self.location {
            bin.location = location.trim().to_string();
        }
        if let Some(capacity) = self.capacity {
            bin.capacity = capacity;
        }
        if let Some(level) = self.fill_level {
            bin.fill_level = level;
        }
        if let Some(status) = &self.status {
            bin.status = status.trim().to_string();
        }
    }
}

fn check_fill_level(level: f64) -> crate::Result<()> {
    if level.is_finite() && level >= 0.0 {
        Ok(())
    } else {
        Err(crate::Error::validation("fill_level must not be negative"))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Weight of one recycled material collected on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecyclingRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub material: String,
    pub weight: f64,
    pub date: NaiveDate,
    pub collected_by: i64,
}

/// Validated input for a new recycling record
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecyclingRecord {
    pub material: String,
    pub weight: f64,
    pub date: NaiveDate,
    pub collected_by: i64,
}

impl NewRecyclingRecord {
    /// Build from possibly-missing request fields.
    ///
    /// `date` must be a `YYYY-MM-DD` calendar date and `weight` positive.
    pub fn from_parts(
        material: Option<String>,
        weight: Option<f64>,
        date: Option<String>,
        collected_by: Option<i64>,
    ) -> crate::Result<Self> {
        let material = non_blank(material);
        let weight = weight.filter(|w| *w > 0.0);
        let date = non_blank(date);
        let (Some(material), Some(weight), Some(date), Some(collected_by)) =
            (material, weight, date, collected_by)
        else {
            return Err(crate::Error::validation(
                "Type, weight, date, and collected_by are required",
            ));
        };

        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
            crate::Error::validation(format!("date '{date}' is not a YYYY-MM-DD date"))
        })?;

        Ok(Self {
            material,
            weight,
            date,
            collected_by,
        })
    }
}
