//! A bounded, concurrent cache of bucket listings.
//!
//! A "bucket" is a directory under a configured root; this crate
//! materialises and serves its listing (object name -> size/mtime) from an
//! embedded sorted key/value store, keeping it live via filesystem-change
//! notifications. The hard part is the concurrent lifecycle of a bounded
//! set of these listings: atomic admission of a new bucket, recycling a
//! least-recently-used one when the cache is full, lock-free reads racing a
//! single filler, and watch-driven invalidation — all without a global
//! lock.
//!
//! # Layout
//!
//! - [`cache`]: [`BucketCache`], the facade (`get_bucket`/`list_bucket`).
//! - [`index`]: the hash-partitioned name -> entry map.
//! - [`lru`]: the multi-lane reference-counted slot arena.
//! - [`entry`]: per-bucket state (name, hash, KV binding, flags, refcount).
//! - [`slot`]: generation-tagged integer handles into an LRU lane.
//! - [`kv`]: the pool of `redb` environments backing each bucket's listing.
//! - [`watch`]: filesystem watch translation into cache mutations.
//! - [`config`]: validated startup configuration.
//! - [`error`]: the error taxonomy.
//! - [`record`]: the KV value schema for one listed object.
//!
//! # Example
//!
//! ```no_run
//! use bucket_cache::{BucketCache, GetFlags};
//!
//! let cache = BucketCache::new("/srv/buckets", "/var/lib/bucket-cache", 10_000, 8, 4);
//! let (handle, _flags) = cache.get_bucket("my-bucket", GetFlags::LOCK).unwrap();
//! assert_eq!(handle.name(), "my-bucket");
//! ```

/// Error taxonomy: process-fatal configuration errors and recoverable
/// per-call errors.
pub mod error;

/// Bucket-name hashing: the single stable hash function used to route a
/// name to both its KV environment and its index/LRU partition.
pub mod hash;

/// KV value schema for one listed object.
pub mod record;

/// Validated startup configuration.
pub mod config;

/// Per-bucket cache record: name, hash, KV binding, flags, refcount.
pub mod entry;

/// Generation-tagged integer handles into an LRU lane's slot arena.
pub mod slot;

/// Multi-lane reference-counted LRU slot arena.
pub mod lru;

/// Hash-partitioned ordered map from bucket name to live entry.
pub mod index;

/// Pool of independent `redb` KV environments, one sub-store per bucket.
pub mod kv;

/// Filesystem watch registration and event translation.
pub mod watch;

/// The cache facade tying every component together.
pub mod cache;

pub use cache::{BucketCache, EntryHandle, GetFlags, ResultFlags};
pub use error::{CacheError, ConfigError};
pub use record::ObjectRecord;
pub use watch::WatchEvent;
