//! Mock Cache Implementation
//!
//! A trait-complete, single-map [`CacheService`] for consumer tests:
//! real statistics and events, honest expiry, but no persistence and no
//! tiering. Swap it in through `dyn CacheService` wherever the production
//! cache is injected.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::contract::{validate_key, CacheService};
use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, CacheEventKind, EventBus, KEY_ALL, KEY_EXPIRED};
use crate::stats::{CacheStats, CacheStatistics, TierGauges};
use crate::{DEFAULT_MAX_CACHE_SIZE, DEFAULT_TTL};

#[derive(Debug, Clone)]
struct MockEntry {
    value: Value,
    expires_at: DateTime<Utc>,
    created: DateTime<Utc>,
    size: u64,
}

/// In-memory stand-in for the production cache.
pub struct MockCache {
    entries: Mutex<HashMap<String, MockEntry>>,
    stats: CacheStats,
    events: EventBus,
    max_bytes: Mutex<u64>,
}

impl MockCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: CacheStats::new(),
            events: EventBus::default(),
            max_bytes: Mutex::new(DEFAULT_MAX_CACHE_SIZE),
        }
    }

    /// Reset the monotonic counters to zero.
    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    fn emit(&self, kind: CacheEventKind, key: &str, data: Option<BTreeMap<String, Value>>) {
        let event = match data {
            Some(data) => CacheEvent::with_data(kind, key, data),
            None => CacheEvent::new(kind, key),
        };
        self.events.publish(event);
    }

    /// Oldest-first eviction down to the configured ceiling.
    fn enforce_size_limit(&self) {
        let max = *self.max_bytes.lock();
        let mut entries = self.entries.lock();

        let mut total: u64 = entries.values().map(|e| e.size).sum();
        if total <= max {
            return;
        }

        let mut ordered: Vec<(String, DateTime<Utc>, u64)> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.created, e.size))
            .collect();
        ordered.sort_by_key(|(_, created, _)| *created);

        for (key, _, size) in ordered {
            if total <= max {
                break;
            }
            entries.remove(&key);
            total = total.saturating_sub(size);
            self.stats.record_eviction();
            let mut data = BTreeMap::new();
            data.insert("reason".to_string(), Value::from("Size limit eviction"));
            self.emit(CacheEventKind::Eviction, &key, Some(data));
        }
    }
}

impl Default for MockCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheService for MockCache {
    async fn get(&self, key: &str, _memory_only: bool) -> Result<Option<Value>> {
        validate_key(key)?;
        self.stats.record_request();

        let found = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(entry) if entry.expires_at <= Utc::now() => {
                    entries.remove(key);
                    None
                }
                Some(entry) => Some(entry.value.clone()),
                None => None,
            }
        };

        match found {
            Some(value) => {
                self.stats.record_hit();
                self.emit(CacheEventKind::Hit, key, None);
                Ok(if value.is_null() { None } else { Some(value) })
            }
            None => {
                self.stats.record_miss();
                self.emit(CacheEventKind::Miss, key, None);
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        expiry: Option<Duration>,
        _memory_only: bool,
    ) -> Result<()> {
        validate_key(key)?;

        let ttl = match expiry {
            Some(d) if d.is_zero() => return Err(CacheError::InvalidExpiry),
            Some(d) => d,
            None => DEFAULT_TTL,
        };

        let serialized =
            serde_json::to_string(&value).map_err(|source| CacheError::SerializeFailed {
                key: key.to_string(),
                source,
            })?;

        let now = Utc::now();
        let expires_at =
            now + ChronoDuration::from_std(ttl).map_err(|_| CacheError::InvalidExpiry)?;

        self.entries.lock().insert(
            key.to_string(),
            MockEntry {
                value,
                expires_at,
                created: now,
                size: serialized.len() as u64,
            },
        );

        let mut data = BTreeMap::new();
        data.insert("expiry".to_string(), Value::from(ttl.as_secs()));
        self.emit(CacheEventKind::Set, key, Some(data));

        self.enforce_size_limit();
        Ok(())
    }

    async fn remove(&self, key: &str, _memory_only: bool) -> Result<()> {
        validate_key(key)?;
        self.entries.lock().remove(key);
        self.emit(CacheEventKind::Remove, key, None);
        Ok(())
    }

    async fn clear(&self, _memory_only: bool) -> Result<()> {
        self.entries.lock().clear();
        self.emit(CacheEventKind::Clear, KEY_ALL, None);
        Ok(())
    }

    async fn has(&self, key: &str, _memory_only: bool) -> Result<bool> {
        validate_key(key)?;

        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at <= Utc::now() => {
                entries.remove(key);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn cache_size(&self) -> Result<u64> {
        Ok(self.entries.lock().values().map(|e| e.size).sum())
    }

    async fn statistics(&self) -> Result<CacheStatistics> {
        let (size, count) = {
            let entries = self.entries.lock();
            (
                entries.values().map(|e| e.size).sum(),
                entries.len() as u64,
            )
        };
        Ok(self.stats.snapshot(TierGauges {
            memory_cache_size: size,
            disk_cache_size: 0,
            memory_item_count: count,
            disk_item_count: 0,
        }))
    }

    async fn clear_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let removed = {
            let mut entries = self.entries.lock();
            let expired: Vec<String> = entries
                .iter()
                .filter(|(_, e)| e.expires_at <= now)
                .map(|(k, _)| k.clone())
                .collect();
            for key in &expired {
                entries.remove(key);
            }
            expired.len() as u64
        };

        if removed > 0 {
            self.stats.record_expired(removed);
            let mut data = BTreeMap::new();
            data.insert("count".to_string(), Value::from(removed));
            self.emit(CacheEventKind::Cleanup, KEY_EXPIRED, Some(data));
        }
        Ok(removed)
    }

    async fn set_max_cache_size(&self, bytes: u64) -> Result<()> {
        if bytes == 0 {
            return Err(CacheError::InvalidMaxSize);
        }
        *self.max_bytes.lock() = bytes;
        self.enforce_size_limit();
        Ok(())
    }

    async fn preload(&self, keys: &[String]) -> Result<()> {
        // single tier: nothing to warm, but keys are still validated
        for key in keys {
            validate_key(key)?;
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// Tests
// =============================================================================
