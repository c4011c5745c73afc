//! Error Taxonomy
//!
//! Mirrors the error policy laid out for the bucket cache: configuration
//! problems are fatal at construction time (the caller aborts the process),
//! everything else is a recoverable `CacheError` returned to the caller.
//!
//! # Policy
//!
//! | Error | Who handles it | Effect on the entry |
//! |-------|-----------------|----------------------|
//! | [`ConfigError`] | `BucketCache::new` logs and exits the process | n/a, construction never completed |
//! | [`CacheError::Transaction`] | returned to the `list_bucket`/`fill` caller | entry remains cached, `FILLED` unchanged |
//! | [`CacheError::BucketVanished`] | returned to the `fill`/`list_bucket` caller | entry remains cached, not marked `FILLED` |

use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration errors, detected once at [`crate::BucketCache::new`].
///
/// The original C++ implementation prints a diagnostic and calls `exit(1)`
/// for each of these; this crate preserves that policy (see
/// [`crate::config::Config::validate`]) rather than returning a `Result`
/// from the constructor, since there is no recoverable state to hand back
/// to the caller — the cache cannot exist without a valid root.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `bucket_root` does not exist or is not a directory.
    #[error("bucket root {0:?} invalid: must be an existing directory")]
    InvalidBucketRoot(PathBuf),

    /// `database_root` does not exist or is not a directory.
    #[error("database root {0:?} invalid: must be an existing directory")]
    InvalidDatabaseRoot(PathBuf),

    /// `max_buckets`, `max_lanes`, or `kv_pool_size` was zero.
    #[error("{field} must be greater than zero")]
    ZeroSizedPool {
        /// Name of the offending configuration field.
        field: &'static str,
    },

    /// The KV environment pool failed to wipe or recreate `database_root`.
    #[error("failed to prepare database root {path:?}: {source}")]
    DatabaseRootSetup {
        /// The path that could not be prepared.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Opening a KV environment under `database_root` failed.
    #[error("failed to open KV environment at {path:?}: {source}")]
    KvOpenFailed {
        /// Partition directory that failed to open.
        path: PathBuf,
        /// Underlying `redb` failure.
        #[source]
        source: redb::Error,
    },
}

/// Recoverable runtime errors surfaced to callers of the cache facade.
///
/// Per-entry errors never evict the entry; only the LRU's reclaim path
/// does that. A caller seeing a [`CacheError`] can safely retry later.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A KV transaction (open, commit, cursor) failed. The entry remains in
    /// the cache with `FILLED` unchanged.
    #[error("KV transaction failed for bucket {bucket:?}: {source}")]
    Transaction {
        /// Name of the bucket being operated on.
        bucket: String,
        /// Underlying `redb` failure.
        #[source]
        source: redb::Error,
    },

    /// The bucket directory could not be enumerated during `fill`. Spec
    /// treats this as fatal in the core design; this crate softens it to a
    /// returned error for library callers (see `SPEC_FULL.md` §7) while
    /// still logging at error level.
    #[error("bucket {0:?} vanished: directory could not be enumerated")]
    BucketVanished(String),

    /// The LRU could not admit a new entry: every lane is full and no
    /// unpinned, reclaimable victim was found in any lane.
    #[error("cache is full: no reclaimable slot in any lane")]
    CacheFull,
}
