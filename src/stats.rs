//! Cache Statistics Collection
//!
//! Monotonic counters for the process lifetime plus point-in-time gauges
//! recomputed on demand. The counters are a performance/debugging aid, not
//! an audit log: nothing here is persisted.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic cache counters.
///
/// Counters only reset via [`reset`](CacheStats::reset).
#[derive(Debug, Default)]
pub struct CacheStats {
    total_requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_items: AtomicU64,
}

impl CacheStats {
    /// Create a zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: u64) {
        self.expired_items.fetch_add(count, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expired_items(&self) -> u64 {
        self.expired_items.load(Ordering::Relaxed)
    }

    /// Hits over total requests; 0 when nothing has been requested yet.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total_requests() as f64;
        if total == 0.0 {
            0.0
        } else {
            self.hits() as f64 / total
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expired_items.store(0, Ordering::Relaxed);
    }

    /// Combine the counters with freshly computed tier gauges.
    pub fn snapshot(&self, gauges: TierGauges) -> CacheStatistics {
        CacheStatistics {
            total_requests: self.total_requests(),
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            expired_items: self.expired_items(),
            hit_ratio: self.hit_ratio(),
            memory_cache_size: gauges.memory_cache_size,
            disk_cache_size: gauges.disk_cache_size,
            memory_item_count: gauges.memory_item_count,
            disk_item_count: gauges.disk_item_count,
        }
    }
}

/// Point-in-time per-tier gauges, recomputed on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierGauges {
    pub memory_cache_size: u64,
    pub disk_cache_size: u64,
    pub memory_item_count: u64,
    pub disk_item_count: u64,
}

/// Snapshot of cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatistics {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_items: u64,
    /// Hits over total requests (0.0 - 1.0)
    pub hit_ratio: f64,
    pub memory_cache_size: u64,
    pub disk_cache_size: u64,
    pub memory_item_count: u64,
    pub disk_item_count: u64,
}

impl CacheStatistics {
    /// Aggregate size across both tiers.
    pub fn total_cache_size(&self) -> u64 {
        self.memory_cache_size + self.disk_cache_size
    }

    /// Aggregate item count across both tiers.
    pub fn total_item_count(&self) -> u64 {
        self.memory_item_count + self.disk_item_count
    }
}

// =============================================================================
// Tests
// =============================================================================
