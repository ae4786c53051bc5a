//! Two-Tier Cache Service
//!
//! Memory + persistent caching with least-recently-used eviction, absolute
//! expiry, size-bounded admission control and structured statistics/event
//! telemetry.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        TieredCache                                │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  Memory Tier              │ Persistent Tier                       │
//! │  ┌─────────────────────┐  │ ┌───────────────────────────────────┐ │
//! │  │ map + recency queue │  │ │ KeyValueStore                     │ │
//! │  │ LRU, 1000 items     │  │ │ cache_v_<key> (payload)           │ │
//! │  │ lazy expiry         │  │ │ cache_m_<key> (expiry/created/    │ │
//! │  └─────────────────────┘  │ │                size)              │ │
//! │            │              │ └───────────────────────────────────┘ │
//! │            └──────────────┴──────────────┐                        │
//! │                                          │                        │
//! │     Size Governor (oldest-created first) │                        │
//! │     Statistics + Event Bus (broadcast)   │                        │
//! │     Expiry Sweeper (periodic task)       │                        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Control flow
//!
//! A `get` checks the memory tier first; on miss it checks the persistent
//! tier, promoting found entries back into memory. A `set` always writes
//! memory and mirrors to the persistent tier, then the governor re-checks
//! the aggregate size ceiling. A background sweep expires entries in both
//! tiers.
//!
//! The two eviction policies are deliberately different: the memory item
//! ceiling evicts by access recency (LRU), the size ceiling evicts by
//! creation time (oldest first), regardless of recency.
//!
//! # Modules
//!
//! - [`contract`] - the `CacheService` operation set + typed extension
//! - [`service`] - production tiered implementation
//! - [`memory`] - bounded LRU memory tier
//! - [`persistent`] - durable tier over a [`store::KeyValueStore`]
//! - [`governor`] - aggregate-size enforcement
//! - [`stats`] - counters and statistics snapshots
//! - [`events`] - broadcast event telemetry
//! - [`mock`] - trait-complete mock for consumer tests
//! - [`error`] - error types

use std::time::Duration;

pub mod contract;
pub mod error;
pub mod events;
pub mod governor;
pub mod memory;
pub mod mock;
pub mod persistent;
pub mod service;
pub mod stats;
pub mod store;

pub use contract::{validate_key, CacheService, CacheServiceExt};
pub use error::{CacheError, Result};
pub use events::{CacheEvent, CacheEventKind, EventBus, KEY_ALL, KEY_EXPIRED};
pub use governor::SizeGovernor;
pub use memory::{MemoryEntry, MemoryLookup, MemoryTier};
pub use mock::MockCache;
pub use persistent::{CacheMetadata, PersistentTier, META_PREFIX, VALUE_PREFIX};
pub use service::{CacheConfig, TieredCache};
pub use stats::{CacheStatistics, CacheStats, TierGauges};
pub use store::{InMemoryStore, KeyValueStore, StoreStats};

/// Memory tier item ceiling
pub const MAX_MEMORY_ITEMS: usize = 1000;

/// Expiry applied when `set` receives none (24 hours)
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default aggregate size ceiling across both tiers (100 MiB)
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 100 * 1024 * 1024;

/// Background expiry sweep period (1 hour)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

// =============================================================================
// Tests
// =============================================================================
