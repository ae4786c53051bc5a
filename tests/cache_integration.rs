//! End-to-end tests of the cache contract against the production
//! implementation, plus a trait-parity check against the mock.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use tiercache::{
    CacheConfig, CacheError, CacheEventKind, CacheService, CacheServiceExt, InMemoryStore,
    KeyValueStore, MockCache, Result, TieredCache,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Track {
    id: String,
    title: String,
    duration_secs: u32,
}

fn sample_track() -> Track {
    Track {
        id: "trk-001".to_string(),
        title: "Solar Winds".to_string(),
        duration_secs: 214,
    }
}

// =============================================================================
// Round-trip and payload semantics
// =============================================================================

#[tokio::test]
async fn test_raw_value_round_trip() {
    let cache = TieredCache::in_memory();

    cache
        .set("album-list", json!(["a", "b", "c"]), None, false)
        .await
        .unwrap();

    let value = cache.get("album-list", false).await.unwrap().unwrap();
    assert_eq!(value, json!(["a", "b", "c"]));
}

#[tokio::test]
async fn test_typed_round_trip() {
    let cache = TieredCache::in_memory();
    let track = sample_track();

    cache.set_as("trk-001", &track, None).await.unwrap();

    let back: Track = cache.get_as("trk-001").await.unwrap().unwrap();
    assert_eq!(back, track);
}

#[tokio::test]
async fn test_null_payload_is_a_miss_to_callers() {
    let cache = TieredCache::in_memory();

    cache.set("k", Value::Null, None, false).await.unwrap();
    assert!(cache.get("k", false).await.unwrap().is_none());
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test]
async fn test_expiry_boundary() {
    let cache = TieredCache::in_memory();

    cache
        .set("short", json!("lived"), Some(Duration::from_millis(50)), false)
        .await
        .unwrap();

    assert!(cache.has("short", false).await.unwrap());
    assert!(cache.get("short", false).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(!cache.has("short", false).await.unwrap());
    assert!(cache.get("short", false).await.unwrap().is_none());
}

#[tokio::test]
async fn test_clear_expired_reports_count() {
    let cache = TieredCache::in_memory();

    cache
        .set("one", json!(1), Some(Duration::from_millis(10)), false)
        .await
        .unwrap();
    cache
        .set("two", json!(2), Some(Duration::from_millis(10)), false)
        .await
        .unwrap();
    cache.set("keeper", json!(3), None, false).await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;

    // dual-resident entries are counted once per tier
    let removed = cache.clear_expired().await.unwrap();
    assert_eq!(removed, 4);
    assert!(cache.has("keeper", false).await.unwrap());

    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.expired_items, 4);
}

// =============================================================================
// LRU eviction (memory item ceiling)
// =============================================================================

#[tokio::test]
async fn test_lru_evicts_least_recently_touched() {
    let config = CacheConfig {
        max_memory_items: 3,
        ..Default::default()
    };
    let cache = TieredCache::with_config(config, Arc::new(InMemoryStore::new()));

    // memory-only writes so eviction leaves no disk copy behind
    cache.set("a", json!(1), None, true).await.unwrap();
    cache.set("b", json!(2), None, true).await.unwrap();
    cache.set("c", json!(3), None, true).await.unwrap();

    // touching a protects it: b is now least recently used
    cache.get("a", true).await.unwrap();

    cache.set("d", json!(4), None, true).await.unwrap();

    assert!(cache.has("a", true).await.unwrap());
    assert!(!cache.has("b", true).await.unwrap());
    assert!(cache.has("c", true).await.unwrap());
    assert!(cache.has("d", true).await.unwrap());

    let stats = cache.statistics().await.unwrap();
    assert!(stats.evictions >= 1);
}

// =============================================================================
// Size eviction (governor, FIFO by creation)
// =============================================================================

#[tokio::test]
async fn test_size_eviction_is_oldest_created_first() {
    let cache = TieredCache::in_memory();
    cache.set_max_cache_size(1000).await.unwrap();

    cache.set("a", json!("x".repeat(400)), None, false).await.unwrap();
    cache.set("b", json!("y".repeat(400)), None, false).await.unwrap();

    // a is the oldest but also the most recently read; FIFO must still
    // pick it over b
    cache.get("a", false).await.unwrap();

    cache.set("c", json!("z".repeat(400)), None, false).await.unwrap();

    assert!(!cache.has("a", false).await.unwrap());
    assert!(cache.has("b", false).await.unwrap());
    assert!(cache.has("c", false).await.unwrap());

    let stats = cache.statistics().await.unwrap();
    assert!(stats.evictions >= 1);
}

#[tokio::test]
async fn test_shrinking_ceiling_evicts_immediately() {
    let cache = TieredCache::in_memory();

    cache.set("a", json!("x".repeat(400)), None, false).await.unwrap();
    cache.set("b", json!("y".repeat(400)), None, false).await.unwrap();

    cache.set_max_cache_size(500).await.unwrap();

    assert!(!cache.has("a", false).await.unwrap());
    assert!(cache.has("b", false).await.unwrap());
    assert!(cache.cache_size().await.unwrap() <= 2 * 500);
}

// =============================================================================
// Statistics
// =============================================================================

#[tokio::test]
async fn test_statistics_consistency() {
    let cache = TieredCache::in_memory();

    cache.set("a", json!(1), None, false).await.unwrap();
    cache.set("b", json!(2), None, false).await.unwrap();

    cache.get("a", false).await.unwrap();
    cache.get("b", false).await.unwrap();
    cache.get("missing-1", false).await.unwrap();
    cache.get("missing-2", false).await.unwrap();
    cache.get("a", false).await.unwrap();

    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.total_requests, 5);
    assert_eq!(stats.hits + stats.misses, stats.total_requests);
    assert_eq!(stats.hits, 3);
    let expected = stats.hits as f64 / stats.total_requests as f64;
    assert!((stats.hit_ratio - expected).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_hit_ratio_zero_with_no_requests() {
    let cache = TieredCache::in_memory();
    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.hit_ratio, 0.0);
}

#[tokio::test]
async fn test_gauges_track_both_tiers() {
    let store = Arc::new(InMemoryStore::new());
    let cache = TieredCache::new(store.clone());

    cache.set("k", json!("payload"), None, false).await.unwrap();

    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.memory_item_count, 1);
    assert_eq!(stats.disk_item_count, 1);
    assert_eq!(stats.memory_cache_size, stats.disk_cache_size);
    assert_eq!(
        stats.total_cache_size(),
        stats.memory_cache_size + stats.disk_cache_size
    );
}

// =============================================================================
// Clear
// =============================================================================

#[tokio::test]
async fn test_clear_is_idempotent() {
    let cache = TieredCache::in_memory();

    cache.set("a", json!(1), None, false).await.unwrap();
    cache.set("b", json!(2), None, false).await.unwrap();

    cache.clear(false).await.unwrap();
    assert_eq!(cache.cache_size().await.unwrap(), 0);

    cache.clear(false).await.unwrap();
    assert_eq!(cache.cache_size().await.unwrap(), 0);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_event_sequence_set_hit_remove_clear() {
    let cache = TieredCache::in_memory();
    let mut rx = cache.subscribe();

    cache.set("k", json!("v"), None, false).await.unwrap();
    cache.get("k", false).await.unwrap();
    cache.remove("k", false).await.unwrap();
    cache.clear(false).await.unwrap();

    let mut kinds = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("event stream ended early")
            .unwrap();
        let done = event.kind == CacheEventKind::Clear;
        kinds.push(event.kind);
        if done {
            break;
        }
    }

    let pos = |kind: CacheEventKind| kinds.iter().position(|k| *k == kind).unwrap();
    assert!(pos(CacheEventKind::Set) < pos(CacheEventKind::Hit));
    assert!(pos(CacheEventKind::Hit) < pos(CacheEventKind::Remove));
    assert!(pos(CacheEventKind::Remove) < pos(CacheEventKind::Clear));
}

#[tokio::test]
async fn test_set_event_carries_effective_expiry() {
    let cache = TieredCache::in_memory();
    let mut rx = cache.subscribe();

    cache
        .set("k", json!("v"), Some(Duration::from_secs(120)), false)
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.kind, CacheEventKind::Set);
    let data = event.data.unwrap();
    assert_eq!(data["expiry"], json!(120));
}

#[tokio::test]
async fn test_eviction_event_names_policy() {
    let config = CacheConfig {
        max_memory_items: 1,
        ..Default::default()
    };
    let cache = TieredCache::with_config(config, Arc::new(InMemoryStore::new()));
    let mut rx = cache.subscribe();

    cache.set("first", json!(1), None, true).await.unwrap();
    cache.set("second", json!(2), None, true).await.unwrap();

    loop {
        let event = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("no eviction event seen")
            .unwrap();
        if event.kind == CacheEventKind::Eviction {
            assert_eq!(event.key, "first");
            assert_eq!(event.data.unwrap()["reason"], json!("LRU eviction"));
            break;
        }
    }
}

// =============================================================================
// Persistence, promotion, preload
// =============================================================================

#[tokio::test]
async fn test_entries_survive_restart() {
    let store = Arc::new(InMemoryStore::new());
    {
        let cache = TieredCache::new(store.clone());
        cache.set_as("track", &sample_track(), None).await.unwrap();
    }

    let cache = TieredCache::new(store);
    let back: Track = cache.get_as("track").await.unwrap().unwrap();
    assert_eq!(back, sample_track());
}

#[tokio::test]
async fn test_meta_prefixed_key_does_not_clobber_neighbor() {
    let store = Arc::new(InMemoryStore::new());
    {
        let cache = TieredCache::new(store.clone());
        cache.set("x", json!("payload-x"), None, false).await.unwrap();
        cache.set("meta_x", json!("payload-meta-x"), None, false).await.unwrap();
    }

    // restart forces both reads through the persistent tier
    let cache = TieredCache::new(store);
    assert_eq!(
        cache.get("x", false).await.unwrap(),
        Some(json!("payload-x"))
    );
    assert_eq!(
        cache.get("meta_x", false).await.unwrap(),
        Some(json!("payload-meta-x"))
    );

    // an unexpired meta_-prefixed entry is not sweep fodder either
    assert_eq!(cache.clear_expired().await.unwrap(), 0);
    assert!(cache.has("meta_x", false).await.unwrap());
}

#[tokio::test]
async fn test_preload_warms_memory_tier() {
    let store = Arc::new(InMemoryStore::new());
    {
        let cache = TieredCache::new(store.clone());
        cache.set("warm-1", json!(1), None, false).await.unwrap();
        cache.set("warm-2", json!(2), None, false).await.unwrap();
    }

    let cache = TieredCache::new(store);
    cache
        .preload(&[
            "warm-1".to_string(),
            "warm-2".to_string(),
            "nowhere".to_string(),
        ])
        .await
        .unwrap();

    // resident in memory now: a memory-only lookup succeeds
    assert!(cache.has("warm-1", true).await.unwrap());
    assert!(cache.has("warm-2", true).await.unwrap());
    assert!(!cache.has("nowhere", true).await.unwrap());
}

// =============================================================================
// Failure behavior
// =============================================================================

/// Store whose writes always fail, for degraded-path testing.
struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get_string(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_string(&self, key: &str, _value: &str) -> Result<()> {
        Err(CacheError::WriteFailed {
            key: key.to_string(),
            reason: "disk unavailable".to_string(),
        })
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_failed_persistence_leaves_memory_entry() {
    let cache = TieredCache::new(Arc::new(FailingStore));

    let result = cache.set("k", json!("v"), None, false).await;
    assert_matches!(result, Err(CacheError::WriteFailed { .. }));

    // degraded but useful: the memory tier kept the entry
    assert_eq!(
        cache.get("k", true).await.unwrap(),
        Some(json!("v"))
    );
}

#[tokio::test]
async fn test_unsupported_typed_value_rejected() {
    use std::collections::HashMap;

    let cache = TieredCache::in_memory();

    // non-string map keys are not representable as JSON
    let mut bad: HashMap<(u8, u8), String> = HashMap::new();
    bad.insert((1, 2), "v".to_string());

    let result = cache.set_as("k", &bad, None).await;
    assert_matches!(result, Err(CacheError::UnsupportedValue { .. }));
    assert!(!cache.has("k", false).await.unwrap());
}

// =============================================================================
// Mock parity
// =============================================================================

async fn exercise(cache: &dyn CacheService) {
    cache.set("p", json!({"v": 1}), None, false).await.unwrap();
    assert!(cache.has("p", false).await.unwrap());
    assert_eq!(
        cache.get("p", false).await.unwrap().unwrap()["v"],
        json!(1)
    );
    assert!(cache.get("q", false).await.unwrap().is_none());

    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.hits + stats.misses, stats.total_requests);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    cache.remove("p", false).await.unwrap();
    assert!(!cache.has("p", false).await.unwrap());

    cache.clear(false).await.unwrap();
    assert_eq!(cache.cache_size().await.unwrap(), 0);
}

#[tokio::test]
async fn test_production_and_mock_agree_on_the_contract() {
    let production = TieredCache::in_memory();
    exercise(&production).await;

    let mock = MockCache::new();
    exercise(&mock).await;
}
