//! Size/Eviction Governor
//!
//! Enforces a maximum aggregate size across both tiers. Eviction here is
//! strictly FIFO by creation time, deliberately different from the memory
//! tier's LRU: the oldest-created entries go first regardless of how
//! recently they were read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::Result;
use crate::memory::MemoryTier;
use crate::persistent::PersistentTier;

/// Aggregate-size ceiling enforcement across both tiers.
pub struct SizeGovernor {
    max_bytes: AtomicU64,
}

impl SizeGovernor {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes: AtomicU64::new(max_bytes),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes.load(Ordering::Relaxed)
    }

    pub fn set_max_bytes(&self, bytes: u64) {
        self.max_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Evict oldest-created entries until the aggregate size fits the
    /// ceiling or no candidates remain. Returns evicted keys in eviction
    /// order.
    ///
    /// An entry resident in both tiers counts once (the serialized sizes
    /// are identical) and is deleted from both. Corrupt metadata never
    /// reaches us: the persistent tier skips it as already gone.
    pub async fn enforce(
        &self,
        memory: &MemoryTier,
        persistent: &PersistentTier,
    ) -> Result<Vec<String>> {
        let max = self.max_bytes();

        // created-ms and bytes per logical key, across both tiers
        let mut candidates: HashMap<String, (i64, u64)> = HashMap::new();
        for (key, created, size) in memory.entries() {
            candidates.insert(key, (created.timestamp_millis(), size));
        }
        for (key, meta) in persistent.entries().await? {
            let slot = candidates.entry(key).or_insert((meta.created, 0));
            slot.0 = slot.0.min(meta.created);
            slot.1 = slot.1.max(meta.size);
        }

        let mut total: u64 = candidates.values().map(|(_, size)| *size).sum();
        if total <= max {
            return Ok(Vec::new());
        }

        let mut ordered: Vec<(String, i64, u64)> = candidates
            .into_iter()
            .map(|(key, (created, size))| (key, created, size))
            .collect();
        ordered.sort_by_key(|(_, created, _)| *created);

        let mut evicted = Vec::new();
        for (key, _, size) in ordered {
            if total <= max {
                break;
            }
            memory.remove(&key);
            persistent.remove(&key).await?;
            total = total.saturating_sub(size);
            evicted.push(key);
        }

        debug!(
            evicted = evicted.len(),
            remaining_bytes = total,
            max_bytes = max,
            "size ceiling enforced"
        );
        Ok(evicted)
    }
}

// =============================================================================
// Tests
// =============================================================================
