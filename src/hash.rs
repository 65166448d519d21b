//! Shard Selection Hash
//!
//! A seeded djb2 variant ("djb33") used to pick the shard for a key. It is
//! not a general-purpose hasher and makes no attempt at collision
//! resistance; the per-process seed is what keeps bucket assignment
//! unpredictable from outside.
//!
//! ## Layout
//!
//! ```text
//!   d = 5381 + seed + len
//!   for each 4-byte group before the last:  d = (d * 33) ^ b   (x4)
//!   last group of 1..=4 bytes:              mix all but its final byte
//!   d ^ (d >> 16)
//! ```
//!
//! The final byte of a non-empty key never reaches the state; only the
//! length does. Bucket assignments of existing deployments depend on this,
//! so it must stay byte-for-byte as is.

/// Multiplier of the classic djb2 step.
const DJB_MULTIPLIER: u32 = 33;

/// Initial state of the classic djb2 hash.
const DJB_INIT: u32 = 5381;

#[inline(always)]
fn mix(d: u32, b: u8) -> u32 {
    d.wrapping_mul(DJB_MULTIPLIER) ^ u32::from(b)
}

/// Hashes `key` under `seed`.
///
/// Deterministic for a fixed `(seed, key)`. All arithmetic wraps.
///
/// # Example
///
/// ```
/// use flashcache::hash::djb33;
///
/// // An empty key only goes through the final shuffle.
/// assert_eq!(djb33(0, b""), 5381);
/// assert_ne!(djb33(0, b"abcd"), djb33(0, b"abc"));
/// ```
#[inline]
pub fn djb33(seed: u32, key: &[u8]) -> u32 {
    let len = key.len();
    let mut d = DJB_INIT.wrapping_add(seed).wrapping_add(len as u32);
    let mut i = 0;

    // Unrolled by hand; a plain per-byte loop is noticeably slower here.
    if len >= 4 {
        while i < len - 4 {
            d = mix(d, key[i]);
            d = mix(d, key[i + 1]);
            d = mix(d, key[i + 2]);
            d = mix(d, key[i + 3]);
            i += 4;
        }
    }

    match len - i {
        2 => {
            d = mix(d, key[i]);
        }
        3 => {
            d = mix(d, key[i]);
            d = mix(d, key[i + 1]);
        }
        4 => {
            d = mix(d, key[i]);
            d = mix(d, key[i + 1]);
            d = mix(d, key[i + 2]);
        }
        // 0 (empty key) and 1 contribute nothing beyond the length
        _ => {}
    }

    d ^ (d >> 16)
}
