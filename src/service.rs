//! Tiered Cache Service
//!
//! Production [`CacheService`] implementation orchestrating the memory
//! tier, persistent tier, size governor, statistics and event telemetry.
//!
//! A `get` checks the memory tier first; on miss (unless memory-only) it
//! checks the persistent tier, promoting found entries back into memory. A
//! `set` always writes memory and, unless memory-only, mirrors to the
//! persistent tier before the governor re-checks the aggregate size. A
//! periodic sweeper expires entries in both tiers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::contract::{validate_key, CacheService};
use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, CacheEventKind, EventBus, KEY_ALL, KEY_EXPIRED};
use crate::governor::SizeGovernor;
use crate::memory::{MemoryEntry, MemoryLookup, MemoryTier};
use crate::persistent::PersistentTier;
use crate::stats::{CacheStats, CacheStatistics, TierGauges};
use crate::store::{InMemoryStore, KeyValueStore};
use crate::{DEFAULT_MAX_CACHE_SIZE, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, MAX_MEMORY_ITEMS};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Expiry applied when `set` receives none
    pub default_ttl: Duration,
    /// Memory tier item ceiling (LRU-evicted past this)
    pub max_memory_items: usize,
    /// Aggregate size ceiling across both tiers
    pub max_cache_size: u64,
    /// Background expiry sweep period
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            max_memory_items: MAX_MEMORY_ITEMS,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Two-tier cache service.
///
/// Construct one per composition root and hand out references (or an
/// `Arc`) to consumers; tests can run any number of independent instances.
pub struct TieredCache {
    memory: MemoryTier,
    persistent: PersistentTier,
    governor: SizeGovernor,
    stats: CacheStats,
    events: EventBus,
    config: CacheConfig,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl TieredCache {
    /// Create a cache with default configuration over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(CacheConfig::default(), store)
    }

    /// Create a cache with custom configuration over the given store.
    pub fn with_config(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            memory: MemoryTier::new(config.max_memory_items),
            persistent: PersistentTier::new(store),
            governor: SizeGovernor::new(config.max_cache_size),
            stats: CacheStats::new(),
            events: EventBus::default(),
            config,
            sweeper: Mutex::new(None),
        }
    }

    /// Create with an in-memory backing store (for testing).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Reset the monotonic counters to zero.
    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    /// Start the periodic expiry sweeper.
    ///
    /// Idempotent: a second call while the sweeper runs is a no-op. Sweep
    /// failures are logged and never surface to callers; the loop only
    /// stops on [`shutdown`](Self::shutdown) or when the cache is dropped.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut guard = self.sweeper.lock();
        if guard.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let child = token.clone();
        let weak = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        let task = tokio::spawn(async move {
            let mut tick = interval(period);
            // the first tick fires immediately; skip it so sweeps are spaced
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = tick.tick() => {
                        let Some(cache) = weak.upgrade() else { break };
                        match cache.clear_expired().await {
                            Ok(0) => {}
                            Ok(count) => debug!(count, "expiry sweep removed entries"),
                            Err(error) => warn!(%error, "expiry sweep failed"),
                        }
                    }
                }
            }
        });

        *guard = Some(SweeperHandle { token, task });
    }

    /// Stop the sweeper, if running.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.token.cancel();
            handle.task.abort();
        }
    }

    fn emit(&self, kind: CacheEventKind, key: &str, data: Option<BTreeMap<String, Value>>) {
        let event = match data {
            Some(data) => CacheEvent::with_data(kind, key, data),
            None => CacheEvent::new(kind, key),
        };
        self.events.publish(event);
    }

    fn record_lru_evictions(&self, victims: Vec<String>) {
        for victim in victims {
            self.stats.record_eviction();
            self.emit(
                CacheEventKind::Eviction,
                &victim,
                Some(reason_data("LRU eviction")),
            );
        }
    }

    async fn enforce_size_limit(&self) -> Result<()> {
        let evicted = self.governor.enforce(&self.memory, &self.persistent).await?;
        for key in evicted {
            self.stats.record_eviction();
            self.emit(
                CacheEventKind::Eviction,
                &key,
                Some(reason_data("Size limit eviction")),
            );
        }
        Ok(())
    }
}

fn reason_data(reason: &str) -> BTreeMap<String, Value> {
    let mut data = BTreeMap::new();
    data.insert("reason".to_string(), Value::from(reason));
    data
}

/// Null payloads are indistinguishable from misses at the contract
/// boundary.
fn collapse_null(value: Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

#[async_trait]
impl CacheService for TieredCache {
    async fn get(&self, key: &str, memory_only: bool) -> Result<Option<Value>> {
        validate_key(key)?;
        self.stats.record_request();

        if let MemoryLookup::Found(entry) = self.memory.get(key) {
            self.stats.record_hit();
            self.emit(CacheEventKind::Hit, key, None);
            return Ok(collapse_null(entry.value));
        }

        if !memory_only {
            if let Some((raw, meta)) = self.persistent.read(key).await? {
                let value: Value = serde_json::from_str(&raw).map_err(|source| {
                    CacheError::DeserializeFailed {
                        key: key.to_string(),
                        source,
                    }
                })?;

                // promote, keeping the persisted expiry and creation time
                let entry = MemoryEntry {
                    value: value.clone(),
                    expires_at: meta.expires_at(),
                    created: meta.created_at(),
                    size: meta.size,
                };
                let victims = self.memory.insert(key, entry);
                self.record_lru_evictions(victims);

                self.stats.record_hit();
                self.emit(CacheEventKind::Hit, key, None);
                return Ok(collapse_null(value));
            }
        }

        self.stats.record_miss();
        self.emit(CacheEventKind::Miss, key, None);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        expiry: Option<Duration>,
        memory_only: bool,
    ) -> Result<()> {
        validate_key(key)?;

        let ttl = match expiry {
            Some(d) if d.is_zero() => return Err(CacheError::InvalidExpiry),
            Some(d) => d,
            None => self.config.default_ttl,
        };

        let serialized =
            serde_json::to_string(&value).map_err(|source| CacheError::SerializeFailed {
                key: key.to_string(),
                source,
            })?;
        let size = serialized.len() as u64;

        let now = Utc::now();
        let expires_at =
            now + ChronoDuration::from_std(ttl).map_err(|_| CacheError::InvalidExpiry)?;

        let entry = MemoryEntry {
            value,
            expires_at,
            created: now,
            size,
        };
        let victims = self.memory.insert(key, entry);
        self.record_lru_evictions(victims);

        // a persistence failure propagates, but the memory write above
        // stays: a degraded cache beats no cache
        if !memory_only {
            self.persistent
                .write(key, &serialized, expires_at.timestamp_millis())
                .await?;
        }

        let mut data = BTreeMap::new();
        data.insert("expiry".to_string(), Value::from(ttl.as_secs()));
        self.emit(CacheEventKind::Set, key, Some(data));

        self.enforce_size_limit().await
    }

    async fn remove(&self, key: &str, memory_only: bool) -> Result<()> {
        validate_key(key)?;

        self.memory.remove(key);
        if !memory_only {
            self.persistent.remove(key).await?;
        }
        self.emit(CacheEventKind::Remove, key, None);
        Ok(())
    }

    async fn clear(&self, memory_only: bool) -> Result<()> {
        self.memory.clear();
        if !memory_only {
            self.persistent
                .clear()
                .await
                .map_err(|e| CacheError::management("clear", e))?;
        }
        self.emit(CacheEventKind::Clear, KEY_ALL, None);
        Ok(())
    }

    async fn has(&self, key: &str, memory_only: bool) -> Result<bool> {
        validate_key(key)?;

        match self.memory.get(key) {
            MemoryLookup::Found(_) => Ok(true),
            MemoryLookup::Expired => Ok(false),
            MemoryLookup::Absent => {
                if memory_only {
                    Ok(false)
                } else {
                    self.persistent.exists(key).await
                }
            }
        }
    }

    async fn cache_size(&self) -> Result<u64> {
        let disk = self
            .persistent
            .total_size()
            .await
            .map_err(|e| CacheError::management("size computation", e))?;
        Ok(self.memory.total_size() + disk)
    }

    async fn statistics(&self) -> Result<CacheStatistics> {
        let disk_entries = self
            .persistent
            .entries()
            .await
            .map_err(|e| CacheError::management("statistics", e))?;

        let gauges = TierGauges {
            memory_cache_size: self.memory.total_size(),
            disk_cache_size: disk_entries.iter().map(|(_, m)| m.size).sum(),
            memory_item_count: self.memory.len() as u64,
            disk_item_count: disk_entries.len() as u64,
        };
        Ok(self.stats.snapshot(gauges))
    }

    async fn clear_expired(&self) -> Result<u64> {
        let expired_memory = self.memory.clear_expired();
        let expired_disk = self
            .persistent
            .clear_expired()
            .await
            .map_err(|e| CacheError::management("cleanup", e))?;

        let total = expired_memory + expired_disk;
        if total > 0 {
            self.stats.record_expired(total);
            let mut data = BTreeMap::new();
            data.insert("count".to_string(), Value::from(total));
            self.emit(CacheEventKind::Cleanup, KEY_EXPIRED, Some(data));
        }
        Ok(total)
    }

    async fn set_max_cache_size(&self, bytes: u64) -> Result<()> {
        if bytes == 0 {
            return Err(CacheError::InvalidMaxSize);
        }
        self.governor.set_max_bytes(bytes);
        self.enforce_size_limit().await
    }

    async fn preload(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            if !self.memory.is_resident(key) {
                self.get(key, false).await?;
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}

impl Drop for TieredCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Tests
// =============================================================================
