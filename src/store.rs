//! Durable Key-Value Primitive
//!
//! The persistent tier consumes a generic string store scoped to the
//! application. Real deployments back this with whatever the platform
//! offers; [`InMemoryStore`] covers tests and embedded use.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;

/// Durable string store the persistent tier layers its namespacing on.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value for a key.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Write a value for a key, replacing any existing one.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently in the store.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Operation counters for a store backend.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
    pub entry_count: u64,
}

/// In-memory backend for testing and embedding.
pub struct InMemoryStore {
    entries: DashMap<String, String>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend operation counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}

// =============================================================================
// Tests
// =============================================================================
