//! Configuration Module
//!
//! Construction-time settings for a sharded cache. None of them can change
//! once the cache exists.

use std::env;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Default number of shards.
/// More shards = less lock contention, but more memory overhead.
pub const DEFAULT_SHARDS: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(n) => n,
    None => unreachable!(),
};

/// Cache configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Number of shards (default: 64)
    pub shards: NonZeroUsize,
    /// TTL for writes using `Expiration::Default` (None = never expire)
    pub default_ttl: Option<Duration>,
    /// Interval between janitor sweeps (None = no janitor)
    pub cleanup_interval: Option<Duration>,
    /// Fixed hash seed (None = draw one at random)
    pub seed: Option<u32>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shards: DEFAULT_SHARDS,
            default_ttl: None,
            cleanup_interval: None,
            seed: None,
        }
    }
}

impl CacheConfig {
    /// Sets the number of shards.
    pub fn with_shards(mut self, shards: NonZeroUsize) -> Self {
        self.shards = shards;
        self
    }

    /// Sets the default TTL. A zero TTL means "never expire".
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = non_zero(ttl);
        self
    }

    /// Enables the janitor. A zero interval leaves it disabled.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = non_zero(interval);
        self
    }

    /// Pins the hash seed, making bucket assignment reproducible across runs.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Creates a CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FLASHCACHE_SHARDS` - Number of shards (default: 64)
    /// - `FLASHCACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: never expire)
    /// - `FLASHCACHE_CLEANUP_INTERVAL_MS` - Janitor interval in milliseconds (default: no janitor)
    /// - `FLASHCACHE_SEED` - Fixed hash seed (default: random)
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_ms = |name: &str| {
            lookup(name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .and_then(|ms| non_zero(Duration::from_millis(ms)))
        };

        Self {
            shards: lookup("FLASHCACHE_SHARDS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_SHARDS),
            default_ttl: parse_ms("FLASHCACHE_DEFAULT_TTL_MS"),
            cleanup_interval: parse_ms("FLASHCACHE_CLEANUP_INTERVAL_MS"),
            seed: lookup("FLASHCACHE_SEED").and_then(|v| v.trim().parse().ok()),
        }
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}
