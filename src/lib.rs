//! # FlashCache - A Sharded In-Process TTL Cache
//!
//! FlashCache is an in-memory key-value cache where every item carries an
//! optional expiration time. The keyspace is split across independently
//! locked shards so that threads working on different keys rarely wait on
//! each other.
//!
//! ## Features
//!
//! - **Sharded Locking**: one `RwLock` per shard, never a cache-wide lock
//! - **Seeded Hashing**: keys are placed by a fast seeded djb2 variant
//! - **TTL Support**: per-item expiration, or a cache-wide default
//! - **Background Cleanup**: an optional janitor task purges expired items
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FlashCache                                 │
//! │                                                                         │
//! │   get / set / add / replace / delete                                    │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │  ┌─────────────────────────┐    ┌──────────────────────────────────┐    │
//! │  │        Router           │───>│  ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │  │ djb33(seed, key) % N    │    │  │Shard 0 │ │Shard 1 │ │...N    │ │    │
//! │  └─────────────────────────┘    │  │RwLock  │ │RwLock  │ │shards  │ │    │
//! │                                 │  └────────┘ └────────┘ └────────┘ │    │
//! │                                 └──────────────────────────────────┘    │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │                 Janitor                         │ │
//! │                     │          (Background Tokio Task)                │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use flashcache::{CacheConfig, CacheError, Expiration, ShardedCache};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache: ShardedCache<String, String> = ShardedCache::new(
//!     CacheConfig::default()
//!         .with_default_ttl(Duration::from_secs(300))
//!         .with_cleanup_interval(Duration::from_secs(1)),
//! );
//!
//! cache.set("name".to_string(), "Ariz".to_string(), Expiration::Default);
//! assert_eq!(cache.get(&"name".to_string()), Some("Ariz".to_string()));
//!
//! assert_eq!(
//!     cache.add("name".to_string(), "other".to_string(), Expiration::Default),
//!     Err(CacheError::KeyExists)
//! );
//!
//! // Stop the janitor explicitly when done
//! cache.close();
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`hash`]: the seeded shard selection hash
//! - [`storage`]: shards, router, janitor and the sharded cache
//! - [`config`]: construction-time settings
//! - [`error`]: errors of the conditional writes
//!
//! ## Design Highlights
//!
//! ### Lock Granularity
//!
//! A keyed operation hashes its key once and takes exactly one shard lock
//! for O(1) work. Whole-cache operations (flush, sweep, snapshot) take the
//! shard locks one at a time and are not atomic across the cache.
//!
//! ### Lazy + Active Expiry
//!
//! 1. **Lazy**: reads check expiry, so an expired item is never returned
//! 2. **Active**: the janitor periodically removes expired items
//!
//! The janitor only reclaims memory; correctness never depends on it.
//!
//! ### Seed
//!
//! The hash seed comes from the OS random source. If that fails the cache
//! still starts, with a seed from a userspace PRNG, logs a warning and
//! reports [`SeedSource::Fallback`].

pub mod config;
pub mod error;
pub mod hash;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use storage::{CacheStats, Expiration, Item, SeedSource, ShardStats, ShardedCache};

/// Version of FlashCache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Routes `tracing` output of a test through the test harness.
/// Filter with `RUST_LOG`, e.g. `RUST_LOG=flashcache=debug`.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
