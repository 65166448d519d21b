//! Cache Items and Expiration Policies

use std::time::{Duration, Instant};

/// A stored value together with the instant it stops being visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<V> {
    /// The actual value stored
    pub value: V,
    /// When this item expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl<V> Item<V> {
    /// Creates an item that expires at `expires_at` (None = never expires).
    pub fn new(value: V, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    /// Creates an item whose lifetime is resolved from `expiration` as of now.
    ///
    /// A TTL too long to represent as an instant never expires.
    pub fn with_expiration(
        value: V,
        expiration: Expiration,
        default_ttl: Option<Duration>,
    ) -> Self {
        Self::new(value, expiration.deadline(default_ttl, Instant::now()))
    }

    /// Checks if this item has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Checks if this item is expired as of `now`.
    ///
    /// An item is expired from its expiration instant onwards.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Returns the remaining time to live, or None if no expiry.
    ///
    /// An expired item reports a zero TTL.
    pub fn ttl(&self) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }
}

/// How long a newly written item should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// Use the default TTL the cache was configured with
    #[default]
    Default,
    /// Never expire; only `delete` or `flush` remove the item
    Never,
    /// Expire this long after the write
    After(Duration),
}

impl Expiration {
    /// Resolves this policy to an absolute deadline.
    ///
    /// `default_ttl` is the cache-wide default (None = never expires). A TTL
    /// that overflows the clock resolves to no deadline.
    pub(crate) fn deadline(self, default_ttl: Option<Duration>, now: Instant) -> Option<Instant> {
        let ttl = match self {
            Expiration::Default => default_ttl?,
            Expiration::Never => return None,
            Expiration::After(ttl) => ttl,
        };
        now.checked_add(ttl)
    }
}

impl From<Duration> for Expiration {
    fn from(ttl: Duration) -> Self {
        Expiration::After(ttl)
    }
}

impl From<Option<Duration>> for Expiration {
    /// `None` maps to [`Expiration::Never`].
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map(Expiration::After).unwrap_or(Expiration::Never)
    }
}
