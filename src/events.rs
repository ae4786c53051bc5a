//! Cache Event Telemetry
//!
//! Every state change in the cache is broadcast as a [`CacheEvent`] on a
//! fan-out channel. Subscribers are independent; there is no replay buffer,
//! so a subscriber joining after an event sees nothing of it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Broadcast channel capacity. Slow subscribers that fall further behind
/// than this observe a `Lagged` error instead of blocking the cache.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Sentinel event key for whole-cache operations.
pub const KEY_ALL: &str = "all";

/// Sentinel event key for expiry sweeps.
pub const KEY_EXPIRED: &str = "expired";

/// Kind of cache state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEventKind {
    Hit,
    Miss,
    Set,
    Remove,
    Eviction,
    Clear,
    Cleanup,
}

impl std::fmt::Display for CacheEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CacheEventKind::Hit => "hit",
            CacheEventKind::Miss => "miss",
            CacheEventKind::Set => "set",
            CacheEventKind::Remove => "remove",
            CacheEventKind::Eviction => "eviction",
            CacheEventKind::Clear => "clear",
            CacheEventKind::Cleanup => "cleanup",
        };
        write!(f, "{}", name)
    }
}

/// A discrete notification of a cache state change.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEvent {
    /// What happened
    #[serde(rename = "type")]
    pub kind: CacheEventKind,
    /// Affected key, or [`KEY_ALL`] / [`KEY_EXPIRED`] for bulk operations
    pub key: String,
    /// Optional detail map, e.g. `{"reason": ...}` or `{"count": ...}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, Value>>,
    /// When the change happened
    pub timestamp: DateTime<Utc>,
}

impl CacheEvent {
    /// Create an event with no detail map.
    pub fn new(kind: CacheEventKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// Create an event carrying a detail map.
    pub fn with_data(
        kind: CacheEventKind,
        key: impl Into<String>,
        data: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            data: Some(data),
            timestamp: Utc::now(),
        }
    }
}

/// Fan-out publisher for cache events.
///
/// Wraps a tokio broadcast channel. Publishing never fails: with no live
/// subscriber the event is simply dropped.
pub struct EventBus {
    tx: broadcast::Sender<CacheEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: CacheEvent) {
        // send only errors when there are no receivers, which is fine
        let _ = self.tx.send(event);
    }

    /// Subscribe to events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

// =============================================================================
// Tests
// =============================================================================
