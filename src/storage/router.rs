//! Shard Router
//!
//! Owns the shard table and the per-process seed, and maps every key to
//! exactly one shard:
//!
//! ```text
//!   bucket(key) = djb33(seed, key_bytes(key)) % shard_count
//! ```
//!
//! The seed, the shard count and the key projection are fixed at
//! construction, so a key maps to the same shard for the router's lifetime
//! and reading them needs no locking. Keyed operations touch one shard and
//! nothing else; whole-cache operations visit the shards one at a time, in
//! order, each under that shard's own lock.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::hash::djb33;
use crate::storage::{Item, Shard};

/// Projects a key onto the bytes that get hashed for shard selection.
pub type KeyBytesFn<K> = for<'a> fn(&'a K) -> Cow<'a, [u8]>;

const NO_BYTES: &[u8] = &[];

/// Key projection for byte and text keys (`String`, `&str`, `Vec<u8>`, `Bytes`, ...).
pub fn native_key_bytes<K>(key: &K) -> Cow<'_, [u8]>
where
    K: AsRef<[u8]> + ?Sized,
{
    Cow::Borrowed(key.as_ref())
}

/// Key projection for keys with no byte form.
///
/// Every key hashes the empty sequence, so all of them land in the single
/// bucket picked by the seed.
pub fn opaque_key_bytes<K: ?Sized>(_key: &K) -> Cow<'_, [u8]> {
    Cow::Borrowed(NO_BYTES)
}

/// Where the router's seed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    /// Supplied by the caller
    Fixed,
    /// Read from the operating system's random source
    Os,
    /// The OS source failed; drawn from a userspace PRNG instead.
    /// Bucket assignment is more predictable from outside.
    Fallback,
}

impl SeedSource {
    /// Returns true if the seed did not come from the preferred source.
    pub fn is_degraded(&self) -> bool {
        matches!(self, SeedSource::Fallback)
    }
}

/// Draws a fresh router seed, preferring the OS random source.
pub fn random_seed() -> (u32, SeedSource) {
    random_seed_with(getrandom::getrandom)
}

fn random_seed_with<F>(fill: F) -> (u32, SeedSource)
where
    F: FnOnce(&mut [u8]) -> Result<(), getrandom::Error>,
{
    let mut buf = [0u8; 4];

    match fill(&mut buf) {
        Ok(()) => (u32::from_ne_bytes(buf), SeedSource::Os),
        Err(err) => {
            warn!(
                error = %err,
                "Failed to read from the OS random source; continuing with an insecure shard seed. \
                 Key distribution may be predictable to an attacker"
            );
            (fallback_seed(), SeedSource::Fallback)
        }
    }
}

fn fallback_seed() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let marker = 0u8;
    let addr = &marker as *const u8 as u64;
    let entropy = nanos ^ (u64::from(std::process::id()) << 32) ^ addr.rotate_left(17);

    StdRng::seed_from_u64(entropy).gen()
}

/// A fixed table of shards plus the state needed to pick one for a key.
pub struct Router<K, V> {
    /// Hash seed, fixed for the router's lifetime
    seed: u32,

    /// Where `seed` came from
    seed_source: SeedSource,

    /// The shards; the index is the bucket id
    shards: Box<[Shard<K, V>]>,

    /// Byte form of a key used for hashing
    key_bytes: KeyBytesFn<K>,
}

impl<K, V> std::fmt::Debug for Router<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("seed_source", &self.seed_source)
            .field("shards", &self.shards.len())
            .finish()
    }
}

impl<K, V> Router<K, V> {
    /// Creates a router over `shard_count` empty shards.
    pub fn new(
        shard_count: NonZeroUsize,
        default_ttl: Option<Duration>,
        (seed, seed_source): (u32, SeedSource),
        key_bytes: KeyBytesFn<K>,
    ) -> Self {
        let shards = (0..shard_count.get())
            .map(|_| Shard::new(default_ttl))
            .collect();

        Self {
            seed,
            seed_source,
            shards,
            key_bytes,
        }
    }

    /// The hash seed.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Where the hash seed came from.
    pub fn seed_source(&self) -> SeedSource {
        self.seed_source
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// All shards, in bucket order.
    pub fn shards(&self) -> &[Shard<K, V>] {
        &self.shards
    }

    /// Determines which bucket a key belongs to.
    #[inline]
    pub fn bucket_index(&self, key: &K) -> usize {
        let bytes = (self.key_bytes)(key);
        djb33(self.seed, &bytes) as usize % self.shards.len()
    }

    /// Gets the shard for a given key.
    #[inline]
    pub fn shard_for(&self, key: &K) -> &Shard<K, V> {
        &self.shards[self.bucket_index(key)]
    }

    /// Purges expired items from every shard, one shard at a time.
    ///
    /// # Returns
    ///
    /// Returns the number of items that were removed.
    pub fn delete_expired(&self) -> usize {
        self.shards.iter().map(Shard::delete_expired).sum()
    }

    /// Removes every item from every shard, one shard at a time.
    pub fn flush(&self) {
        for shard in self.shards.iter() {
            shard.flush();
        }
    }

    /// Number of items across all shards, including expired ones not yet purged.
    pub fn item_count(&self) -> usize {
        self.shards.iter().map(Shard::item_count).sum()
    }
}

impl<K, V> Router<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Copies every shard's items, one table per shard in bucket order.
    pub fn items(&self) -> Vec<HashMap<K, Item<V>>> {
        self.shards.iter().map(Shard::items).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Expiration;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    fn router(shards: usize, seed: u32) -> Router<String, u32> {
        Router::new(
            NonZeroUsize::new(shards).unwrap(),
            None,
            (seed, SeedSource::Fixed),
            native_key_bytes::<String>,
        )
    }

    #[test]
    fn test_bucket_is_deterministic() {
        let a = router(16, 42);
        let b = router(16, 42);

        for i in 0..1000 {
            let key = format!("key:{}", i);
            assert_eq!(a.bucket_index(&key), a.bucket_index(&key));
            assert_eq!(a.bucket_index(&key), b.bucket_index(&key));
        }
    }

    #[test]
    fn test_bucket_matches_hash() {
        let router = router(7, 99);
        let key = "session:abcdef".to_string();

        assert_eq!(
            router.bucket_index(&key),
            djb33(99, key.as_bytes()) as usize % 7
        );
    }

    #[test]
    fn test_bucket_in_range() {
        let router = router(5, 1);
        for i in 0..500 {
            assert!(router.bucket_index(&format!("k{}", i)) < 5);
        }
    }

    #[test]
    fn test_single_shard_takes_everything() {
        let router = router(1, 1234);
        for i in 0..100 {
            assert_eq!(router.bucket_index(&format!("key{}", i)), 0);
        }
    }

    #[test]
    fn test_opaque_keys_share_a_bucket() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct Point(i32, i32);

        let router: Router<Point, u32> = Router::new(
            NonZeroUsize::new(8).unwrap(),
            None,
            (5, SeedSource::Fixed),
            opaque_key_bytes::<Point>,
        );

        let expected = djb33(5, b"") as usize % 8;
        for i in 0..50 {
            assert_eq!(router.bucket_index(&Point(i, -i)), expected);
        }
    }

    #[test]
    fn test_custom_projection() {
        fn id_bytes(key: &u64) -> Cow<'_, [u8]> {
            Cow::Owned(key.to_be_bytes().to_vec())
        }

        let router: Router<u64, u32> = Router::new(
            NonZeroUsize::new(8).unwrap(),
            None,
            (5, SeedSource::Fixed),
            id_bytes,
        );

        let key = 0x0102_0304_0506_0708u64;
        assert_eq!(
            router.bucket_index(&key),
            djb33(5, &key.to_be_bytes()) as usize % 8
        );
    }

    #[test]
    fn test_keyed_operations_stay_in_one_shard() {
        let router = router(8, 3);
        let key = "isolated".to_string();
        let bucket = router.bucket_index(&key);

        router
            .shard_for(&key)
            .set(key.clone(), 1, Expiration::Never);

        for (i, shard) in router.shards().iter().enumerate() {
            let expected = usize::from(i == bucket);
            assert_eq!(shard.item_count(), expected);
        }
    }

    #[test]
    fn test_fan_out_operations() {
        let router = router(4, 11);
        for i in 0..100 {
            let key = format!("key{}", i);
            router.shard_for(&key).set(key.clone(), i, Expiration::Never);
        }

        assert_eq!(router.item_count(), 100);
        assert_eq!(router.items().len(), 4);
        assert_eq!(router.items().iter().map(HashMap::len).sum::<usize>(), 100);

        router.flush();
        assert_eq!(router.item_count(), 0);
        assert!(router.items().iter().all(HashMap::is_empty));
    }

    #[test]
    fn test_random_seed_from_os() {
        let (_, source) = random_seed();
        assert_eq!(source, SeedSource::Os);
        assert!(!source.is_degraded());
    }

    /// Log sink for asserting on emitted events.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_random_seed_fallback() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let (_, source) = tracing::subscriber::with_default(subscriber, || {
            random_seed_with(|_| Err(getrandom::Error::UNSUPPORTED))
        });

        assert_eq!(source, SeedSource::Fallback);
        assert!(source.is_degraded());

        let output = logs.contents();
        assert!(output.contains("WARN"), "no warning logged: {output}");
        assert!(output.contains("insecure shard seed"), "unexpected log: {output}");
    }

    #[test]
    fn test_os_seed_logs_nothing() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let (_, source) = tracing::subscriber::with_default(subscriber, || {
            random_seed_with(|buf| {
                buf.fill(7);
                Ok(())
            })
        });

        assert_eq!(source, SeedSource::Os);
        assert!(logs.contents().is_empty());
    }
}
