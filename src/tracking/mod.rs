//! Live collector position tracking
//!
//! The deployment tracks exactly one collector. Its row lives under the
//! fixed key [`COLLECTOR_ID`](crate::models::COLLECTOR_ID); a report
//! overwrites it in place and then notifies every subscriber.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use tokio::sync::Mutex;

use crate::broadcast::{Broadcaster, Event, Subscription};
use crate::error::{Error, Result};
use crate::models::Collector;
use crate::storage::SharedStore;

/// Owner of the singleton collector position
pub struct LocationTracker {
    store: SharedStore,
    broadcaster: Arc<Broadcaster>,
    /// Serializes writes and subscriptions; holds the last written timestamp
    gate: Mutex<Option<DateTime<Utc>>>,
}

impl LocationTracker {
    pub fn new(store: SharedStore, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            store,
            broadcaster,
            gate: Mutex::new(None),
        }
    }

    /// Record a new collector position and notify subscribers.
    ///
    /// Both coordinates must be present; `0.0` is a valid value. The
    /// returned collector is the persisted row. Notification problems are
    /// logged by the broadcaster and never fail the report.
    pub async fn report_location(
        &self,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Collector> {
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            return Err(Error::validation("Missing latitude or longitude"));
        };

        let mut last_written = self.gate.lock().await;

        // Stored with microsecond precision; keep successive writes strictly increasing
        let mut now = Utc::now().trunc_subsecs(6);
        if let Some(previous) = *last_written {
            if now <= previous {
                now = previous + Duration::microseconds(1);
            }
        }

        let collector = self.store.upsert_collector(latitude, longitude, now)?;
        *last_written = Some(now);

        let report = self.broadcaster.publish(Event::CollectorUpdate(collector.clone()));
        tracing::info!(
            latitude,
            longitude,
            notified = report.delivered,
            "Collector location updated"
        );

        Ok(collector)
    }

    /// Current collector position, if one was ever reported
    pub fn get_location(&self) -> Result<Option<Collector>> {
        self.store.get_collector()
    }

    /// Register a subscriber and replay the current position to it alone.
    ///
    /// Runs under the write gate so a report cannot slip between reading
    /// the replay state and registering the subscriber.
    pub async fn subscribe(&self) -> Result<Subscription> {
        let _gate = self.gate.lock().await;
        let current = self.store.get_collector()?;
        Ok(self
            .broadcaster
            .subscribe_with(current.map(Event::CollectorUpdate)))
    }

    /// Deregister a subscriber
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.broadcaster.unsubscribe(subscription.id())
    }
}
