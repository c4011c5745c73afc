//! Bucket Name Hashing
//!
//! A single, stable hash function used for two independent purposes:
//! selecting a KV environment (`hash(name) mod kv_pool_size`) and selecting
//! a partition of the index / a lane of the LRU. Both mappings must be
//! deterministic for the lifetime of the cache (Invariant 5), so the seed is
//! fixed and the algorithm never varies at runtime.
//!
//! The original C++ implementation hashes with `XXH64(name, len, seed)`;
//! `twox-hash` is the XXH64 implementation this ecosystem reaches for, so
//! this is a direct translation rather than a reinterpretation.

use twox_hash::XxHash64;
use std::hash::Hasher;

/// Seed used for every bucket-name hash, matching the original
/// implementation's `Bucket::seed`.
pub const SEED: u64 = 8675309;

/// Hashes a bucket name with the cache's single stable hash function.
///
/// # Examples
///
/// ```
/// use bucket_cache::hash::hash_name;
///
/// // Deterministic: same name always hashes to the same value.
/// assert_eq!(hash_name("stanley"), hash_name("stanley"));
/// assert_ne!(hash_name("stanley"), hash_name("oliver"));
/// ```
pub fn hash_name(name: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(SEED);
    hasher.write(name.as_bytes());
    hasher.finish()
}
