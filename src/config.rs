//! Cache Configuration
//!
//! Unlike the teacher crate's per-algorithm config structs (one entry point
//! per eviction policy), this system has a single shape to configure: the
//! two filesystem roots and three pool sizes. [`Config::validate`] is the
//! single entry point, matching the "config as the single entry point"
//! design philosophy of `cache-rs`'s own config module, generalized to one
//! type since there is only one cache shape here.
//!
//! # Examples
//!
//! ```no_run
//! use bucket_cache::config::Config;
//!
//! let config = Config::validate("bucket_root", "database_root", 100, 3, 3)
//!     .expect("valid roots");
//! assert_eq!(config.max_buckets(), 100);
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Validated configuration for a [`crate::BucketCache`].
///
/// Construction always goes through [`Config::validate`]; there is no way
/// to build one with an unchecked root, which is what lets
/// [`crate::BucketCache::new`] skip re-validating anything downstream.
#[derive(Debug, Clone)]
pub struct Config {
    bucket_root: PathBuf,
    database_root: PathBuf,
    max_buckets: u32,
    max_lanes: u8,
    kv_pool_size: u8,
}

impl Config {
    /// Validates both roots and pool sizes.
    ///
    /// Returns [`ConfigError`] rather than panicking or exiting — the
    /// process-fatal policy spec.md mandates for configuration errors lives
    /// in the constructor that calls this, not here, so this function stays
    /// testable without forking a process.
    pub fn validate(
        bucket_root: impl AsRef<Path>,
        database_root: impl AsRef<Path>,
        max_buckets: u32,
        max_lanes: u8,
        kv_pool_size: u8,
    ) -> Result<Self, ConfigError> {
        let bucket_root = bucket_root.as_ref().to_path_buf();
        let database_root = database_root.as_ref().to_path_buf();

        if !bucket_root.is_dir() {
            return Err(ConfigError::InvalidBucketRoot(bucket_root));
        }
        if !database_root.is_dir() {
            return Err(ConfigError::InvalidDatabaseRoot(database_root));
        }
        if max_buckets == 0 {
            return Err(ConfigError::ZeroSizedPool {
                field: "max_buckets",
            });
        }
        if max_lanes == 0 {
            return Err(ConfigError::ZeroSizedPool { field: "max_lanes" });
        }
        if kv_pool_size == 0 {
            return Err(ConfigError::ZeroSizedPool {
                field: "kv_pool_size",
            });
        }

        Ok(Self {
            bucket_root,
            database_root,
            max_buckets,
            max_lanes,
            kv_pool_size,
        })
    }

    /// Root directory whose immediate subdirectories are cacheable buckets.
    pub fn bucket_root(&self) -> &Path {
        &self.bucket_root
    }

    /// Root directory exclusively owned by this process's KV environments.
    pub fn database_root(&self) -> &Path {
        &self.database_root
    }

    /// Maximum number of buckets held across all LRU lanes.
    pub fn max_buckets(&self) -> u32 {
        self.max_buckets
    }

    /// Number of parallel LRU lanes.
    pub fn max_lanes(&self) -> u8 {
        self.max_lanes
    }

    /// Number of independent KV environments in the pool.
    pub fn kv_pool_size(&self) -> u8 {
        self.kv_pool_size
    }

    /// Per-lane capacity: `max_buckets / max_lanes`, rounded down but never
    /// below 1, matching the original's `max_buckets/max_lanes` lane sizing.
    pub fn lane_capacity(&self) -> usize {
        ((self.max_buckets / self.max_lanes as u32).max(1)) as usize
    }
}
