//! Persistent Tier - Durable Cold Cache
//!
//! Stores two parallel records per logical key on a [`KeyValueStore`]:
//! the serialized payload at `cache_v_<key>` and a small metadata record at
//! `cache_m_<key>`, so size and expiry bookkeeping never deserializes
//! payloads. The prefixes are disjoint: no logical key can make a payload
//! record collide with another key's metadata record. Orphaned or
//! unparseable records are reconciled lazily: treated as a miss and removed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CacheError, Result};
use crate::store::KeyValueStore;

/// Prefix for payload records.
pub const VALUE_PREFIX: &str = "cache_v_";

/// Prefix for metadata records.
pub const META_PREFIX: &str = "cache_m_";

/// Metadata persisted beside each payload record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Absolute expiry, epoch milliseconds
    pub expiry: i64,
    /// Insertion instant, epoch milliseconds
    pub created: i64,
    /// Serialized payload length in bytes
    pub size: u64,
}

impl CacheMetadata {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry <= now_ms
    }

    /// Creation instant as a timestamp; clamps unrepresentable values to now.
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.created).unwrap_or_else(Utc::now)
    }

    /// Expiry instant as a timestamp; clamps unrepresentable values to now.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.expiry).unwrap_or_else(Utc::now)
    }
}

/// Durable tier layered over a generic string store.
pub struct PersistentTier {
    store: Arc<dyn KeyValueStore>,
}

impl PersistentTier {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn value_key(key: &str) -> String {
        format!("{}{}", VALUE_PREFIX, key)
    }

    fn meta_key(key: &str) -> String {
        format!("{}{}", META_PREFIX, key)
    }

    /// Read the payload and metadata for a key.
    ///
    /// Expired entries and half-written or corrupt record pairs are removed
    /// and reported as absent.
    pub async fn read(&self, key: &str) -> Result<Option<(String, CacheMetadata)>> {
        let meta_raw = self.store.get_string(&Self::meta_key(key)).await?;
        let value_raw = self.store.get_string(&Self::value_key(key)).await?;

        let (meta_raw, value_raw) = match (meta_raw, value_raw) {
            (Some(m), Some(v)) => (m, v),
            (None, None) => return Ok(None),
            _ => {
                warn!(key, "removing orphaned cache record");
                self.remove(key).await?;
                return Ok(None);
            }
        };

        let meta: CacheMetadata = match serde_json::from_str(&meta_raw) {
            Ok(meta) => meta,
            Err(_) => {
                warn!(key, "removing corrupted cache metadata");
                self.remove(key).await?;
                return Ok(None);
            }
        };

        if meta.is_expired(Utc::now().timestamp_millis()) {
            self.remove(key).await?;
            return Ok(None);
        }

        Ok(Some((value_raw, meta)))
    }

    /// Write the payload and its metadata, replacing any existing records.
    pub async fn write(&self, key: &str, serialized: &str, expiry_ms: i64) -> Result<()> {
        let meta = CacheMetadata {
            expiry: expiry_ms,
            created: Utc::now().timestamp_millis(),
            size: serialized.len() as u64,
        };
        let meta_json =
            serde_json::to_string(&meta).map_err(|source| CacheError::SerializeFailed {
                key: key.to_string(),
                source,
            })?;

        self.store.set_string(&Self::value_key(key), serialized).await?;
        self.store.set_string(&Self::meta_key(key), &meta_json).await?;
        Ok(())
    }

    /// Remove both records for a key.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(&Self::value_key(key)).await?;
        self.store.remove(&Self::meta_key(key)).await?;
        Ok(())
    }

    /// Remove every record under the cache namespace.
    pub async fn clear(&self) -> Result<()> {
        for key in self.store.keys().await? {
            if key.starts_with(VALUE_PREFIX) || key.starts_with(META_PREFIX) {
                self.store.remove(&key).await?;
            }
        }
        Ok(())
    }

    /// Whether a live (unexpired, intact) record exists for the key.
    ///
    /// Side-effecting: expired or corrupt records found here are removed.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.read(key).await?.is_some())
    }

    /// All `(key, metadata)` pairs; corrupt metadata is skipped.
    pub async fn entries(&self) -> Result<Vec<(String, CacheMetadata)>> {
        let mut out = Vec::new();
        for store_key in self.store.keys().await? {
            let Some(key) = store_key.strip_prefix(META_PREFIX) else {
                continue;
            };
            let Some(raw) = self.store.get_string(&store_key).await? else {
                continue;
            };
            match serde_json::from_str::<CacheMetadata>(&raw) {
                Ok(meta) => out.push((key.to_string(), meta)),
                Err(_) => warn!(key, "skipping corrupted cache metadata during scan"),
            }
        }
        Ok(out)
    }

    /// Sum of persisted payload sizes from metadata.
    pub async fn total_size(&self) -> Result<u64> {
        Ok(self.entries().await?.iter().map(|(_, m)| m.size).sum())
    }

    /// Number of persisted entries.
    pub async fn item_count(&self) -> Result<u64> {
        Ok(self.entries().await?.len() as u64)
    }

    /// Remove every expired record; unparseable metadata counts as expired.
    ///
    /// Returns how many logical entries were removed.
    pub async fn clear_expired(&self) -> Result<u64> {
        let now_ms = Utc::now().timestamp_millis();
        let mut removed = 0u64;

        for store_key in self.store.keys().await? {
            let Some(key) = store_key.strip_prefix(META_PREFIX) else {
                continue;
            };
            let Some(raw) = self.store.get_string(&store_key).await? else {
                continue;
            };
            let expired = match serde_json::from_str::<CacheMetadata>(&raw) {
                Ok(meta) => meta.is_expired(now_ms),
                Err(_) => {
                    warn!(key, "treating corrupted cache metadata as expired");
                    true
                }
            };
            if expired {
                let key = key.to_string();
                self.remove(&key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// =============================================================================
// Tests
// =============================================================================
