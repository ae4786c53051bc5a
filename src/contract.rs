//! Cache Contract
//!
//! The operation set every cache implementation satisfies, production
//! ([`TieredCache`](crate::TieredCache)) or mock
//! ([`MockCache`](crate::MockCache)). The trait is type-erased over
//! [`serde_json::Value`] so it stays object-safe; typed encode/decode lives
//! in the blanket [`CacheServiceExt`] extension.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{CacheError, Result};
use crate::events::CacheEvent;
use crate::stats::CacheStatistics;

/// Check a cache key: non-empty, only alphanumerics, `-`, `_`, `.`.
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidKey {
            key: key.to_string(),
        })
    }
}

/// The two-tier cache operation set.
///
/// All operations validate their key before any I/O. `memory_only` scopes
/// an operation to the memory tier; the default path touches both tiers.
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Look up a key, memory tier first, promoting persistent-tier hits
    /// back into memory. Null payloads read back as `None`.
    async fn get(&self, key: &str, memory_only: bool) -> Result<Option<Value>>;

    /// Store a value. `expiry` defaults to the configured TTL; zero is
    /// rejected. Unless `memory_only`, the value is mirrored to the
    /// persistent tier and the size ceiling is re-enforced afterward.
    async fn set(
        &self,
        key: &str,
        value: Value,
        expiry: Option<Duration>,
        memory_only: bool,
    ) -> Result<()>;

    /// Delete a key from the memory tier and, unless `memory_only`, from
    /// the persistent tier.
    async fn remove(&self, key: &str, memory_only: bool) -> Result<()>;

    /// Empty the memory tier and, unless `memory_only`, every persisted
    /// record under the cache namespace.
    async fn clear(&self, memory_only: bool) -> Result<()>;

    /// Whether an unexpired entry exists. Side-effecting: expired entries
    /// found along the way are removed.
    async fn has(&self, key: &str, memory_only: bool) -> Result<bool>;

    /// Sum of per-entry sizes in memory plus persisted metadata sizes.
    ///
    /// A dual-resident entry contributes to both tiers here, while the
    /// size governor counts each logical key once; right after
    /// enforcement this sum may therefore exceed the configured ceiling
    /// by up to the memory tier's share.
    async fn cache_size(&self) -> Result<u64>;

    /// Counter snapshot plus freshly computed tier gauges.
    async fn statistics(&self) -> Result<CacheStatistics>;

    /// Sweep expired entries from both tiers. Returns how many were
    /// removed.
    async fn clear_expired(&self) -> Result<u64>;

    /// Update the aggregate-size ceiling and immediately re-enforce it.
    /// Zero is rejected.
    async fn set_max_cache_size(&self, bytes: u64) -> Result<()>;

    /// Warm the memory tier: each key not already resident is fetched
    /// through a normal `get` (a no-op when the key is nowhere).
    async fn preload(&self, keys: &[String]) -> Result<()>;

    /// Subscribe to the live event feed. No replay: events published
    /// before the subscription are not seen.
    fn subscribe(&self) -> broadcast::Receiver<CacheEvent>;
}

/// Typed convenience layer over the type-erased contract.
#[async_trait]
pub trait CacheServiceExt: CacheService {
    /// Fetch and decode a value into `T`.
    async fn get_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key, false).await? {
            Some(value) => {
                let typed = serde_json::from_value(value).map_err(|source| {
                    CacheError::DeserializeFailed {
                        key: key.to_string(),
                        source,
                    }
                })?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    /// Encode `value` and store it. Types that cannot be represented as
    /// JSON are rejected before anything is written.
    async fn set_as<T>(&self, key: &str, value: &T, expiry: Option<Duration>) -> Result<()>
    where
        T: Serialize + Send + Sync,
    {
        let value = serde_json::to_value(value).map_err(|_| CacheError::UnsupportedValue {
            type_name: std::any::type_name::<T>(),
        })?;
        self.set(key, value, expiry, false).await
    }
}

impl<C: CacheService + ?Sized> CacheServiceExt for C {}

// =============================================================================
// Tests
// =============================================================================
