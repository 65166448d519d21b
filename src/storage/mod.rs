//! Storage Module
//!
//! This module provides the sharded cache and the pieces it is built from:
//! the single-shard table, the router that picks a shard for each key, and
//! the background janitor that purges expired items.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ShardedCache                            │
//! │   bucket = djb33(seed, key) % N                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │         Janitor           │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: independent shards reduce lock contention
//! - **Seeded Routing**: a per-process random seed decides key placement
//! - **Lazy Expiry**: expired items are invisible to reads immediately
//! - **Active Expiry**: the janitor reclaims memory of expired items
//!
//! ## Example
//!
//! ```
//! use flashcache::storage::{Expiration, ShardedCache};
//! use flashcache::CacheConfig;
//! use std::time::Duration;
//!
//! let cache: ShardedCache<String, u64> = ShardedCache::new(CacheConfig::default());
//!
//! cache.set("visits".to_string(), 1, Expiration::Never);
//! cache.set("otp".to_string(), 123456, Duration::from_secs(30));
//!
//! assert_eq!(cache.get(&"visits".to_string()), Some(1));
//! ```

pub mod item;
pub mod janitor;
pub mod router;
pub mod shard;
pub mod sharded;


// Re-export commonly used types
pub use item::{Expiration, Item};
pub use janitor::Janitor;
pub use router::{native_key_bytes, opaque_key_bytes, KeyBytesFn, Router, SeedSource};
pub use shard::{Shard, ShardStats};
pub use sharded::{CacheStats, ShardedCache};
