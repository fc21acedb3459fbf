//! Subscriber registry and event fan-out
//!
//! The [`Broadcaster`] keeps one bounded FIFO queue per subscriber.
//! Publishing pushes a clone of the event onto every queue without waiting.
//! A subscriber whose queue is full or closed is dropped from the registry,
//! so memory per subscriber stays capped and the request that caused the
//! event never blocks. Each transport (the WebSocket endpoint, tests)
//! drains its own [`Subscription`].
//!
//! ```text
//!   publish(event) ──┬──▶ [queue #1] ──▶ subscriber 1
//!                    ├──▶ [queue #2] ──▶ subscriber 2
//!                    └──▶ [queue #n] ──▶ subscriber n
//! ```
//!
//! Events reach a single subscriber in publish order. Nothing is promised
//! about ordering across subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::Error;
use crate::models::{CollectionSchedule, Collector};

// ============================================================================
// Events
// ============================================================================

/// Events pushed to subscribers
///
/// Serialized as `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// The collector reported a new position (also replayed on subscribe)
    CollectorUpdate(Collector),

    /// The generator created a schedule
    NewSchedule(CollectionSchedule),
}

impl Event {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::CollectorUpdate(_) => "collector_update",
            Self::NewSchedule(_) => "new_schedule",
        }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Identifier handed out by [`Broadcaster::subscribe`]
pub type SubscriberId = u64;

/// Receiving end of one registered subscriber
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Event>,
}

impl Subscription {
    /// Registry id of this subscriber
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event; `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Take the next queued event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Outcome of a single publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub event: &'static str,
    pub delivered: usize,
    pub failed: usize,
}

/// Running totals since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastStats {
    pub subscribers: usize,
    pub events_published: u64,
    pub deliveries_failed: u64,
}

/// Events a subscriber may have queued before it is considered stalled
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// Transport-independent subscriber registry
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Event>>>,
    capacity: usize,
    next_id: AtomicU64,
    events_published: AtomicU64,
    deliveries_failed: AtomicU64,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl Broadcaster {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with `capacity` queued events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            deliveries_failed: AtomicU64::new(0),
        }
    }

    /// Per-subscriber queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_with(None::<Event>)
    }

    /// Register a new subscriber whose queue starts with `replay`.
    ///
    /// The replay events are queued before the subscriber becomes visible
    /// to [`publish`](Self::publish), so they always arrive first and only
    /// this subscriber sees them. The queue grows to hold the whole replay
    /// when it exceeds the configured capacity.
    pub fn subscribe_with(&self, replay: impl IntoIterator<Item = Event>) -> Subscription {
        let replay: Vec<Event> = replay.into_iter().collect();
        let (sender, receiver) = mpsc::channel(self.capacity.max(replay.len()));
        for event in replay {
            // Receiver is alive and the queue was sized for the replay
            let _ = sender.try_send(event);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);

        tracing::debug!(subscriber = id, "Subscriber registered");
        Subscription { id, receiver }
    }

    /// Deregister a subscriber; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();

        if removed {
            tracing::debug!(subscriber = id, "Subscriber removed");
        }
        removed
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Never fails or waits. A subscriber whose queue is full or closed
    /// is logged, counted and dropped from the registry; events already in
    /// its queue stay readable.
    pub fn publish(&self, event: Event) -> PublishReport {
        let name = event.name();
        let mut delivered = 0;
        let mut dead = Vec::new();

        {
            let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            for (id, sender) in subscribers.iter() {
                match sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => dead.push((*id, "queue full")),
                    Err(TrySendError::Closed(_)) => dead.push((*id, "receiver closed")),
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
            for (id, reason) in &dead {
                let err = Error::BroadcastDelivery {
                    event: name,
                    subscriber: *id,
                };
                tracing::warn!(error = %err, reason, "Dropping unreachable subscriber");
                subscribers.remove(id);
            }
        }

        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.deliveries_failed
            .fetch_add(dead.len() as u64, Ordering::Relaxed);

        tracing::debug!(event = name, delivered, failed = dead.len(), "Event published");

        PublishReport {
            event: name,
            delivered,
            failed: dead.len(),
        }
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Snapshot of counters
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            subscribers: self.subscriber_count(),
            events_published: self.events_published.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
