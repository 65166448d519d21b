//! Sharded Cache
//!
//! The public face of the crate: a [`Router`] for the data plus an optional
//! [`Janitor`] that purges expired items in the background.
//!
//! Keyed operations hash the key once, then hand the call to that key's
//! shard unchanged, errors included. Whole-cache operations (`flush`,
//! `delete_expired`, `items`) visit the shards one after another. They hold
//! one shard lock at a time, so they are not atomic across the cache: a
//! concurrent reader may see some shards before and some after.
//!
//! ## Shutdown
//!
//! Call [`ShardedCache::stop_janitor`] or [`ShardedCache::close`] when done.
//! Dropping the cache also stops the janitor.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::storage::router::{native_key_bytes, opaque_key_bytes, random_seed};
use crate::storage::{Expiration, Item, Janitor, KeyBytesFn, Router, SeedSource, ShardStats};

/// A TTL cache split into independently locked shards.
///
/// # Thread Safety
///
/// All operations take `&self`. Share the cache across threads with an `Arc`.
///
/// # Example
///
/// ```
/// use flashcache::{CacheConfig, Expiration, ShardedCache};
/// use std::num::NonZeroUsize;
/// use std::time::Duration;
///
/// let cache: ShardedCache<String, String> = ShardedCache::new(
///     CacheConfig::default().with_shards(NonZeroUsize::new(16).unwrap()),
/// );
///
/// cache.set("name".to_string(), "Ariz".to_string(), Expiration::Never);
/// assert_eq!(cache.get(&"name".to_string()), Some("Ariz".to_string()));
///
/// cache.set(
///     "session".to_string(),
///     "token123".to_string(),
///     Duration::from_secs(3600),
/// );
/// assert!(cache.add("session".to_string(), "other".to_string(), Expiration::Never).is_err());
/// ```
pub struct ShardedCache<K, V> {
    /// Shard table, shared with the janitor
    router: Arc<Router<K, V>>,

    /// Background sweeper, if a cleanup interval was configured
    janitor: Option<Janitor>,
}

impl<K, V> std::fmt::Debug for ShardedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedCache")
            .field("router", &self.router)
            .field("janitor", &self.janitor)
            .finish()
    }
}

impl<K, V> ShardedCache<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache for byte or text keys.
    pub fn new(config: CacheConfig) -> Self
    where
        K: AsRef<[u8]>,
    {
        Self::with_key_bytes(config, native_key_bytes::<K>)
    }

    /// Creates a cache whose keys are hashed through `key_bytes`.
    ///
    /// The projection must be deterministic: equal keys must yield equal bytes.
    pub fn with_key_bytes(config: CacheConfig, key_bytes: KeyBytesFn<K>) -> Self {
        let seed = match config.seed {
            Some(seed) => (seed, SeedSource::Fixed),
            None => random_seed(),
        };

        let router = Arc::new(Router::new(
            config.shards,
            config.default_ttl,
            seed,
            key_bytes,
        ));

        let janitor = config
            .cleanup_interval
            .filter(|interval| !interval.is_zero())
            .map(|interval| Janitor::start(Arc::clone(&router), interval));

        Self { router, janitor }
    }

    /// Creates a cache for keys with no byte form.
    ///
    /// Every key lands in the same shard, so this behaves like a single
    /// locked map. Prefer [`ShardedCache::with_key_bytes`].
    pub fn opaque(config: CacheConfig) -> Self {
        warn!(
            shards = config.shards.get(),
            "Cache keys have no byte projection; all keys will share one shard"
        );
        Self::with_key_bytes(config, opaque_key_bytes::<K>)
    }
}

impl<K, V> ShardedCache<K, V> {
    /// The hash seed.
    pub fn seed(&self) -> u32 {
        self.router.seed()
    }

    /// Where the hash seed came from. [`SeedSource::Fallback`] means the OS
    /// random source was unavailable at construction.
    pub fn seed_source(&self) -> SeedSource {
        self.router.seed_source()
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.router.shard_count()
    }

    /// The shard index a key maps to.
    pub fn bucket_of(&self, key: &K) -> usize {
        self.router.bucket_index(key)
    }

    /// Returns true while the janitor is sweeping.
    pub fn janitor_running(&self) -> bool {
        self.janitor.as_ref().is_some_and(Janitor::is_running)
    }

    /// Stops the janitor. Safe to call any number of times.
    ///
    /// Expired items are still hidden from reads afterwards, but they stay
    /// in memory until [`ShardedCache::delete_expired`] is called.
    pub fn stop_janitor(&self) {
        if let Some(janitor) = &self.janitor {
            janitor.stop();
        }
    }

    /// Stops the janitor and drops the cache.
    pub fn close(self) {
        self.stop_janitor();
    }

    /// Purges expired items from every shard.
    ///
    /// # Returns
    ///
    /// Returns the number of items that were removed.
    pub fn delete_expired(&self) -> usize {
        self.router.delete_expired()
    }

    /// Removes every item from every shard, including ones that never expire.
    pub fn flush(&self) {
        self.router.flush();
    }

    /// Number of items held, including expired ones not yet purged.
    pub fn item_count(&self) -> usize {
        self.router.item_count()
    }

    /// Per-shard operation counters, in bucket order.
    pub fn shard_stats(&self) -> Vec<ShardStats> {
        self.router.shards().iter().map(|shard| shard.stats()).collect()
    }

    /// Operation counters summed over all shards.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            shards: self.shard_count(),
            ..CacheStats::default()
        };

        for shard in self.shard_stats() {
            stats.items += shard.items;
            stats.get_ops += shard.get_ops;
            stats.hits += shard.hits;
            stats.set_ops += shard.set_ops;
            stats.del_ops += shard.del_ops;
            stats.expired += shard.expired;
        }

        stats
    }
}

impl<K, V> ShardedCache<K, V>
where
    K: Eq + Hash,
{
    /// Stores an item, replacing whatever was under the key.
    pub fn set(&self, key: K, value: V, expiration: impl Into<Expiration>) {
        self.router
            .shard_for(&key)
            .set(key, value, expiration.into());
    }

    /// Stores an item only if no live item exists under the key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::KeyExists`](crate::CacheError::KeyExists) if a live item is present.
    pub fn add(&self, key: K, value: V, expiration: impl Into<Expiration>) -> Result<()> {
        self.router
            .shard_for(&key)
            .add(key, value, expiration.into())
    }

    /// Overwrites an item only if a live item exists under the key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::KeyNotFound`](crate::CacheError::KeyNotFound) if the key is absent or expired.
    pub fn replace(&self, key: K, value: V, expiration: impl Into<Expiration>) -> Result<()> {
        self.router
            .shard_for(&key)
            .replace(key, value, expiration.into())
    }

    /// Removes the item under the key.
    ///
    /// # Returns
    ///
    /// Returns `true` if an item was removed.
    pub fn delete(&self, key: &K) -> bool {
        self.router.shard_for(key).delete(key)
    }
}

impl<K, V> ShardedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired, whether or
    /// not the expired item has been purged yet.
    pub fn get(&self, key: &K) -> Option<V> {
        self.router.shard_for(key).get(key)
    }

    /// Gets the value for a key along with its expiration instant.
    pub fn get_with_expiration(&self, key: &K) -> Option<(V, Option<Instant>)> {
        self.router.shard_for(key).get_with_expiration(key)
    }
}

impl<K, V> ShardedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Copies the items of every shard, one table per shard in bucket order.
    ///
    /// Tables may contain expired items that have not been purged yet;
    /// filter with [`Item::is_expired`] if only live items are wanted.
    pub fn items(&self) -> Vec<HashMap<K, Item<V>>> {
        self.router.items()
    }
}

/// Cache-wide statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of shards
    pub shards: usize,
    /// Items currently held, including expired ones not yet purged
    pub items: usize,
    /// Total lookups
    pub get_ops: u64,
    /// Lookups that found a live item
    pub hits: u64,
    /// Successful writes
    pub set_ops: u64,
    /// Total deletes
    pub del_ops: u64,
    /// Items purged as expired
    pub expired: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0.0 with no lookups.
    pub fn hit_rate(&self) -> f64 {
        if self.get_ops == 0 {
            0.0
        } else {
            self.hits as f64 / self.get_ops as f64
        }
    }
}
