//! Memory Tier - In-Process Hot Cache
//!
//! Bounded key-value table with per-entry absolute expiry and strict LRU
//! tracking. The backing map and the recency queue are mutated together
//! under one lock: no entry without a queue slot, no queue slot without an
//! entry.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

/// A memory-resident cache entry.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    /// Decoded payload
    pub value: Value,
    /// Absolute expiry instant
    pub expires_at: DateTime<Utc>,
    /// Insertion instant, used for oldest-first size eviction
    pub created: DateTime<Utc>,
    /// Serialized size in bytes
    pub size: u64,
}

/// Outcome of a memory-tier lookup.
#[derive(Debug)]
pub enum MemoryLookup {
    /// Present and unexpired; recency was refreshed
    Found(MemoryEntry),
    /// Present but past expiry; the entry was removed
    Expired,
    /// Not present
    Absent,
}

#[derive(Default)]
struct MemoryInner {
    map: HashMap<String, MemoryEntry>,
    /// Recency order, least-recently-used at the front
    recency: VecDeque<String>,
}

impl MemoryInner {
    fn detach(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
    }
}

/// Bounded in-process tier with LRU eviction.
pub struct MemoryTier {
    inner: Mutex<MemoryInner>,
    max_items: usize,
}

impl MemoryTier {
    /// Create a tier holding at most `max_items` entries.
    pub fn new(max_items: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            max_items,
        }
    }

    /// Insert or replace an entry, refreshing its recency slot.
    ///
    /// Returns the keys evicted (least-recently-used first) to keep the
    /// tier within its item ceiling; bulk overshoot evicts repeatedly.
    pub fn insert(&self, key: &str, entry: MemoryEntry) -> Vec<String> {
        let mut inner = self.inner.lock();

        if inner.map.insert(key.to_string(), entry).is_some() {
            inner.detach(key);
        }
        inner.recency.push_back(key.to_string());

        let mut evicted = Vec::new();
        while inner.map.len() > self.max_items {
            let Some(victim) = inner.recency.pop_front() else {
                break;
            };
            if inner.map.remove(&victim).is_some() {
                evicted.push(victim);
            }
        }
        evicted
    }

    /// Look up an entry, refreshing recency on a live hit and removing the
    /// entry when it has expired.
    pub fn get(&self, key: &str) -> MemoryLookup {
        let mut inner = self.inner.lock();

        let Some(entry) = inner.map.get(key) else {
            return MemoryLookup::Absent;
        };

        if entry.expires_at <= Utc::now() {
            inner.map.remove(key);
            inner.detach(key);
            return MemoryLookup::Expired;
        }

        let entry = entry.clone();
        inner.detach(key);
        inner.recency.push_back(key.to_string());
        MemoryLookup::Found(entry)
    }

    /// Whether a key occupies a slot, without touching recency or expiry.
    pub fn is_resident(&self, key: &str) -> bool {
        self.inner.lock().map.contains_key(key)
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.map.remove(key).is_some();
        if removed {
            inner.detach(key);
        }
        removed
    }

    /// Drop every entry and the whole recency queue.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.recency.clear();
    }

    /// Remove every entry past its expiry. Returns how many were removed.
    pub fn clear_expired(&self) -> u64 {
        let now = Utc::now();
        let mut inner = self.inner.lock();

        let expired: Vec<String> = inner
            .map
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            inner.map.remove(key);
            inner.detach(key);
        }
        expired.len() as u64
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of per-entry serialized sizes.
    pub fn total_size(&self) -> u64 {
        self.inner.lock().map.values().map(|e| e.size).sum()
    }

    /// Snapshot of `(key, created, size)` for every resident entry.
    pub fn entries(&self) -> Vec<(String, DateTime<Utc>, u64)> {
        self.inner
            .lock()
            .map
            .iter()
            .map(|(k, e)| (k.clone(), e.created, e.size))
            .collect()
    }

    #[cfg(test)]
    fn recency_len(&self) -> usize {
        self.inner.lock().recency.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
