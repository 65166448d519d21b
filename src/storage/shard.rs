//! Single-Shard Cache
//!
//! One `RwLock<HashMap>` of items. This is the unit of mutual exclusion: every
//! operation takes the shard's lock once, does O(1) work (or one pass over
//! this shard for the sweep/snapshot/flush operations) and releases it.
//!
//! A shard is usable on its own as a plain TTL cache. The sharded cache owns
//! a fixed set of them and routes each key to exactly one.
//!
//! ## Expiry
//!
//! Reads check expiry themselves, so an expired item is invisible the moment
//! its deadline passes. Reads never take the write lock to remove it; the
//! memory is reclaimed by [`Shard::delete_expired`], normally driven by the
//! janitor.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{CacheError, Result};
use crate::storage::{Expiration, Item};

/// A single independently locked table of items.
///
/// # Example
///
/// ```
/// use flashcache::storage::{Expiration, Shard};
/// use std::time::Duration;
///
/// let shard: Shard<String, u32> = Shard::new(Some(Duration::from_secs(60)));
///
/// shard.set("answer".to_string(), 42, Expiration::Default);
/// assert_eq!(shard.get(&"answer".to_string()), Some(42));
///
/// // add refuses to overwrite a live item
/// assert!(shard.add("answer".to_string(), 7, Expiration::Never).is_err());
/// ```
pub struct Shard<K, V> {
    /// The items of this shard
    data: RwLock<HashMap<K, Item<V>>>,

    /// TTL applied for `Expiration::Default` (None = never expires)
    default_ttl: Option<Duration>,

    /// Statistics: lookups (`get` and `get_with_expiration`)
    get_count: AtomicU64,

    /// Statistics: lookups that found a live item
    hit_count: AtomicU64,

    /// Statistics: successful writes (`set`, `add`, `replace`)
    set_count: AtomicU64,

    /// Statistics: `delete` calls
    del_count: AtomicU64,

    /// Statistics: items purged by `delete_expired`
    expired_count: AtomicU64,
}

impl<K, V> std::fmt::Debug for Shard<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("items", &self.data.read().len())
            .field("default_ttl", &self.default_ttl)
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> Default for Shard<K, V> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<K, V> Shard<K, V> {
    /// Creates an empty shard.
    ///
    /// A zero `default_ttl` is treated as "never expire".
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            default_ttl: default_ttl.filter(|ttl| !ttl.is_zero()),
            get_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// The TTL used for `Expiration::Default`.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Number of items held, including expired ones not yet purged.
    pub fn item_count(&self) -> usize {
        self.data.read().len()
    }

    /// Removes every item, including ones that never expire.
    pub fn flush(&self) {
        self.data.write().clear();
    }

    /// Returns this shard's operation counters.
    pub fn stats(&self) -> ShardStats {
        ShardStats {
            items: self.item_count(),
            get_ops: self.get_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Purges every expired item from this shard.
    ///
    /// # Returns
    ///
    /// Returns the number of items that were removed.
    pub fn delete_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write();
        let before = data.len();

        data.retain(|_, item| !item.is_expired_at(now));

        let removed = before - data.len();
        drop(data);

        if removed > 0 {
            self.expired_count
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }
}

impl<K, V> Shard<K, V>
where
    K: Eq + Hash,
{
    /// Stores an item, replacing whatever was under the key.
    pub fn set(&self, key: K, value: V, expiration: Expiration) {
        let item = Item::with_expiration(value, expiration, self.default_ttl);

        self.data.write().insert(key, item);
        self.set_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Stores an item only if no live item exists under the key.
    ///
    /// An expired item that has not been purged yet counts as absent and is
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::KeyExists`] if a live item is present.
    pub fn add(&self, key: K, value: V, expiration: Expiration) -> Result<()> {
        let now = Instant::now();
        let mut data = self.data.write();

        if data.get(&key).is_some_and(|item| !item.is_expired_at(now)) {
            return Err(CacheError::KeyExists);
        }

        let expires_at = expiration.deadline(self.default_ttl, now);
        data.insert(key, Item::new(value, expires_at));
        self.set_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Overwrites an item only if a live item exists under the key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::KeyNotFound`] if the key is absent or expired.
    pub fn replace(&self, key: K, value: V, expiration: Expiration) -> Result<()> {
        let now = Instant::now();
        let mut data = self.data.write();

        match data.get_mut(&key) {
            Some(item) if !item.is_expired_at(now) => {
                item.value = value;
                item.expires_at = expiration.deadline(self.default_ttl, now);
            }
            _ => return Err(CacheError::KeyNotFound),
        }

        self.set_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Removes the item under the key.
    ///
    /// # Returns
    ///
    /// Returns `true` if an item (live or expired) was removed.
    pub fn delete(&self, key: &K) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        self.data.write().remove(key).is_some()
    }
}

impl<K, V> Shard<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_with_expiration(key).map(|(value, _)| value)
    }

    /// Gets the value for a key along with its expiration instant.
    ///
    /// The instant is `None` for items that never expire.
    pub fn get_with_expiration(&self, key: &K) -> Option<(V, Option<Instant>)> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let data = self.data.read();
        let item = data.get(key).filter(|item| !item.is_expired())?;

        self.hit_count.fetch_add(1, Ordering::Relaxed);
        Some((item.value.clone(), item.expires_at))
    }
}

impl<K, V> Shard<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Returns a copy of every item in this shard.
    ///
    /// The copy may include expired items that have not been purged yet;
    /// check [`Item::is_expired`] if that matters.
    pub fn items(&self) -> HashMap<K, Item<V>> {
        self.data.read().clone()
    }
}

/// Operation counters for one shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
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

impl ShardStats {
    /// Total operations routed to this shard.
    pub fn total_ops(&self) -> u64 {
        self.get_ops + self.set_ops + self.del_ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn shard() -> Shard<String, String> {
        Shard::new(None)
    }

    #[test]
    fn test_set_and_get() {
        let shard = shard();

        shard.set("key".into(), "value".into(), Expiration::Default);
        assert_eq!(shard.get(&"key".into()), Some("value".to_string()));
    }

    #[test]
    fn test_get_nonexistent() {
        let shard = shard();
        assert_eq!(shard.get(&"nonexistent".into()), None);
    }

    #[test]
    fn test_set_overwrites() {
        let shard = shard();

        shard.set("key".into(), "value1".into(), Expiration::Default);
        shard.set("key".into(), "value2".into(), Expiration::Default);

        assert_eq!(shard.get(&"key".into()), Some("value2".to_string()));
        assert_eq!(shard.item_count(), 1);
    }

    #[test]
    fn test_delete() {
        let shard = shard();

        shard.set("key".into(), "value".into(), Expiration::Never);
        assert!(shard.delete(&"key".into()));
        assert_eq!(shard.get(&"key".into()), None);
        assert!(!shard.delete(&"key".into())); // Already deleted
    }

    #[test]
    fn test_lazy_expiry_keeps_item_until_sweep() {
        let shard = shard();

        shard.set(
            "key".into(),
            "value".into(),
            Expiration::After(Duration::from_millis(20)),
        );
        assert!(shard.get(&"key".into()).is_some());

        sleep(Duration::from_millis(50));

        // Invisible to reads, but still physically present
        assert_eq!(shard.get(&"key".into()), None);
        assert_eq!(shard.item_count(), 1);
        assert!(shard.items().contains_key("key"));

        assert_eq!(shard.delete_expired(), 1);
        assert_eq!(shard.item_count(), 0);
    }

    #[test]
    fn test_default_ttl_applies() {
        let shard: Shard<String, u32> = Shard::new(Some(Duration::from_millis(20)));

        shard.set("key".into(), 1, Expiration::Default);
        shard.set("forever".into(), 2, Expiration::Never);

        let (_, expires_at) = shard.get_with_expiration(&"key".into()).unwrap();
        assert!(expires_at.is_some());

        sleep(Duration::from_millis(50));

        assert_eq!(shard.get(&"key".into()), None);
        assert_eq!(shard.get(&"forever".into()), Some(2));
    }

    #[test]
    fn test_zero_default_ttl_means_never() {
        let shard: Shard<String, u32> = Shard::new(Some(Duration::ZERO));
        assert_eq!(shard.default_ttl(), None);

        shard.set("key".into(), 1, Expiration::Default);
        let (_, expires_at) = shard.get_with_expiration(&"key".into()).unwrap();
        assert_eq!(expires_at, None);
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let shard: Shard<String, u32> = Shard::new(Some(Duration::MAX));

        shard.set("explicit".into(), 1, Expiration::After(Duration::MAX));
        shard.set("default".into(), 2, Expiration::Default);
        assert!(shard
            .add("added".into(), 3, Expiration::After(Duration::MAX))
            .is_ok());
        assert!(shard
            .replace("explicit".into(), 4, Expiration::Default)
            .is_ok());

        for key in ["explicit", "default", "added"] {
            let (_, expires_at) = shard.get_with_expiration(&key.into()).unwrap();
            assert_eq!(expires_at, None);
        }
        assert_eq!(shard.delete_expired(), 0);
    }

    #[test]
    fn test_add() {
        let shard = shard();

        assert!(shard
            .add("key".into(), "v1".into(), Expiration::Never)
            .is_ok());
        assert_eq!(
            shard.add("key".into(), "v2".into(), Expiration::Never),
            Err(CacheError::KeyExists)
        );
        assert_eq!(shard.get(&"key".into()), Some("v1".to_string()));
    }

    #[test]
    fn test_add_over_expired_item() {
        let shard = shard();

        shard.set(
            "key".into(),
            "old".into(),
            Expiration::After(Duration::from_millis(10)),
        );
        sleep(Duration::from_millis(30));

        assert!(shard
            .add("key".into(), "new".into(), Expiration::Never)
            .is_ok());
        assert_eq!(shard.get(&"key".into()), Some("new".to_string()));
    }

    #[test]
    fn test_replace() {
        let shard = shard();

        assert_eq!(
            shard.replace("key".into(), "v1".into(), Expiration::Never),
            Err(CacheError::KeyNotFound)
        );

        shard.set("key".into(), "v1".into(), Expiration::Never);
        assert!(shard
            .replace("key".into(), "v2".into(), Expiration::Never)
            .is_ok());
        assert_eq!(shard.get(&"key".into()), Some("v2".to_string()));
    }

    #[test]
    fn test_replace_expired_item() {
        let shard = shard();

        shard.set(
            "key".into(),
            "v1".into(),
            Expiration::After(Duration::from_millis(10)),
        );
        sleep(Duration::from_millis(30));

        assert_eq!(
            shard.replace("key".into(), "v2".into(), Expiration::Never),
            Err(CacheError::KeyNotFound)
        );
    }

    #[test]
    fn test_delete_expired_keeps_live_items() {
        let shard = shard();

        shard.set(
            "key1".into(),
            "value1".into(),
            Expiration::After(Duration::from_millis(10)),
        );
        shard.set(
            "key2".into(),
            "value2".into(),
            Expiration::After(Duration::from_millis(10)),
        );
        shard.set("key3".into(), "value3".into(), Expiration::Never);

        sleep(Duration::from_millis(50));

        assert_eq!(shard.delete_expired(), 2);
        assert_eq!(shard.item_count(), 1);
        assert_eq!(shard.get(&"key3".into()), Some("value3".to_string()));
        assert_eq!(shard.stats().expired, 2);
    }

    #[test]
    fn test_flush_removes_everything() {
        let shard = shard();

        shard.set("key1".into(), "value1".into(), Expiration::Never);
        shard.set(
            "key2".into(),
            "value2".into(),
            Expiration::After(Duration::from_secs(60)),
        );

        shard.flush();

        assert_eq!(shard.item_count(), 0);
        assert!(shard.items().is_empty());
    }

    #[test]
    fn test_stats() {
        let shard = shard();

        shard.set("key".into(), "value".into(), Expiration::Never);
        shard.get(&"key".into()); // hit
        shard.get(&"missing".into()); // miss
        shard.delete(&"key".into());

        let stats = shard.stats();
        assert_eq!(stats.set_ops, 1);
        assert_eq!(stats.get_ops, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.del_ops, 1);
        assert_eq!(stats.total_ops(), 4);
        assert_eq!(stats.items, 0);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let shard: Arc<Shard<String, usize>> = Arc::new(Shard::new(None));
        let mut handles = vec![];

        for i in 0..10 {
            let shard = Arc::clone(&shard);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    shard.set(key.clone(), j, Expiration::Never);
                    assert_eq!(shard.get(&key), Some(j));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shard.item_count(), 1000);
    }
}
