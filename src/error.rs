//! Error types for the cache
//!
//! Only the conditional writes can fail. Every other operation is total once
//! a cache has been constructed.

use thiserror::Error;

/// Errors returned by [`Shard::add`](crate::storage::Shard::add) and
/// [`Shard::replace`](crate::storage::Shard::replace), and passed through
/// unchanged by the sharded cache.
///
/// Both are ordinary outcomes of cache usage. Callers are expected to match
/// on them rather than treat them as failures of the cache itself.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// `add` found a live entry under the key
    #[error("key already exists")]
    KeyExists,

    /// `replace` found no live entry under the key
    #[error("key not found")]
    KeyNotFound,
}

/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
