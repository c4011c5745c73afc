//! KV Environment Pool
//!
//! Grounded on the pack's `KvChainStore` (`other_examples/..._kv_chainstore.rs.rs`),
//! which stores blockchain metadata in `redb` tables opened per write/read
//! transaction. This module generalizes that one-database shape to a pool
//! of `pool_size` independent `redb::Database`s — one per `part_<i>`
//! subdirectory of `database_root` — matching the original C++'s `Lmdbs`
//! inner class, which wiped `database_root` and opened one LMDB
//! environment per partition directory. `redb` is a pure-Rust embedded
//! sorted store, so it plays the same role here that LMDB played in the
//! original without needing to link a C library.
//!
//! Each bucket is its own `redb` table (`TableDefinition<&str, &[u8]>`)
//! inside whichever environment `hash(name) mod pool_size` selects, keyed
//! by object name and holding a bincode-encoded [`crate::record::ObjectRecord`].

use std::fs;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};

use crate::entry::KvBinding;
use crate::error::{CacheError, ConfigError};
use crate::record::ObjectRecord;

/// A pool of independent KV environments, one per partition directory.
#[derive(Debug)]
pub struct KvPool {
    envs: Vec<Database>,
}

impl KvPool {
    /// Wipes `database_root`, recreates `part_0..part_{pool_size-1}` beneath
    /// it, and opens one `redb::Database` per partition.
    pub fn new(database_root: &Path, pool_size: u8) -> Result<Self, ConfigError> {
        if database_root.exists() {
            fs::remove_dir_all(database_root).map_err(|source| ConfigError::DatabaseRootSetup {
                path: database_root.to_path_buf(),
                source,
            })?;
        }
        fs::create_dir_all(database_root).map_err(|source| ConfigError::DatabaseRootSetup {
            path: database_root.to_path_buf(),
            source,
        })?;

        let mut envs = Vec::with_capacity(pool_size as usize);
        for i in 0..pool_size {
            let part_dir = database_root.join(format!("part_{i}"));
            fs::create_dir_all(&part_dir).map_err(|source| ConfigError::DatabaseRootSetup {
                path: part_dir.clone(),
                source,
            })?;
            let db_path = part_dir.join("data.redb");
            let db = Database::create(&db_path).map_err(|source| ConfigError::KvOpenFailed {
                path: db_path,
                source: source.into(),
            })?;
            envs.push(db);
        }
        Ok(Self { envs })
    }

    /// Number of environments in the pool.
    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    /// Environment index a given hash is always routed to.
    pub fn env_index_for_hash(&self, hash: u64) -> usize {
        hash as usize % self.envs.len()
    }

    /// Replaces the named sub-store's full contents with `entries`, as a
    /// single write transaction. Used by `fill` (first population) and by
    /// re-fill after a watch-driven `clear_filled`.
    pub fn fill(
        &self,
        binding: &KvBinding,
        entries: &[(String, ObjectRecord)],
    ) -> Result<(), CacheError> {
        let db = &self.envs[binding.env_index];
        let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&binding.substore);

        let write_txn = db
            .begin_write()
            .map_err(|e| transaction_error(&binding.substore, e))?;
        {
            // Ignore "no such table" when this is the substore's first fill.
            let _ = write_txn.delete_table(table_def);
            let mut table = write_txn
                .open_table(table_def)
                .map_err(|e| transaction_error(&binding.substore, e))?;
            for (name, record) in entries {
                let encoded = record.encode();
                table
                    .insert(name.as_str(), encoded.as_slice())
                    .map_err(|e| transaction_error(&binding.substore, e))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| transaction_error(&binding.substore, e))?;
        Ok(())
    }

    /// Inserts or replaces a single object record, creating the sub-store
    /// if it doesn't exist yet. Used by the watch pipeline's incremental
    /// `ADD` handling, which must not disturb any other key already in the
    /// sub-store the way a full [`KvPool::fill`] would.
    pub fn put_one(&self, binding: &KvBinding, name: &str, record: ObjectRecord) -> Result<(), CacheError> {
        let db = &self.envs[binding.env_index];
        let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&binding.substore);
        let write_txn = db
            .begin_write()
            .map_err(|e| transaction_error(&binding.substore, e))?;
        {
            let mut table = write_txn
                .open_table(table_def)
                .map_err(|e| transaction_error(&binding.substore, e))?;
            let encoded = record.encode();
            table
                .insert(name, encoded.as_slice())
                .map_err(|e| transaction_error(&binding.substore, e))?;
        }
        write_txn
            .commit()
            .map_err(|e| transaction_error(&binding.substore, e))?;
        Ok(())
    }

    /// Lists object names strictly greater than `marker` (or from the
    /// start, if `marker` is `None`), up to `limit` names. Matches
    /// spec.md's pinned answer to the marker-inclusivity open question:
    /// the marker itself is excluded.
    pub fn list(
        &self,
        binding: &KvBinding,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, CacheError> {
        let db = &self.envs[binding.env_index];
        let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&binding.substore);

        let read_txn = db
            .begin_read()
            .map_err(|e| transaction_error(&binding.substore, e))?;
        let table = match read_txn.open_table(table_def) {
            Ok(table) => table,
            // Never filled yet; caller is expected to fill before listing.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(transaction_error(&binding.substore, e)),
        };

        let mut names = Vec::with_capacity(limit);
        let iter: Box<dyn Iterator<Item = _>> = match marker {
            Some(m) => Box::new(
                table
                    .range::<&str>((std::ops::Bound::Excluded(m), std::ops::Bound::Unbounded))
                    .map_err(|e| transaction_error(&binding.substore, e))?,
            ),
            None => Box::new(
                table
                    .iter()
                    .map_err(|e| transaction_error(&binding.substore, e))?,
            ),
        };
        for item in iter {
            let (key, _value) = item.map_err(|e| transaction_error(&binding.substore, e))?;
            names.push(key.value().to_string());
            if names.len() >= limit {
                break;
            }
        }
        Ok(names)
    }

    /// Removes a single object record, if present. Used by the watch
    /// pipeline's incremental `REMOVE` handling.
    pub fn remove_one(&self, binding: &KvBinding, name: &str) -> Result<(), CacheError> {
        let db = &self.envs[binding.env_index];
        let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&binding.substore);
        let write_txn = db
            .begin_write()
            .map_err(|e| transaction_error(&binding.substore, e))?;
        {
            let mut table = write_txn
                .open_table(table_def)
                .map_err(|e| transaction_error(&binding.substore, e))?;
            table
                .remove(name)
                .map_err(|e| transaction_error(&binding.substore, e))?;
        }
        write_txn
            .commit()
            .map_err(|e| transaction_error(&binding.substore, e))?;
        Ok(())
    }

    /// Drops the named sub-store entirely. Used both when a lane recycles a
    /// slot (the evicted bucket's data must not leak into the next
    /// occupant) and when a watch overflow forces a full invalidation.
    pub fn clear_substore(&self, binding: &KvBinding) -> Result<(), CacheError> {
        let db = &self.envs[binding.env_index];
        let table_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&binding.substore);
        let write_txn = db
            .begin_write()
            .map_err(|e| transaction_error(&binding.substore, e))?;
        let _ = write_txn.delete_table(table_def);
        write_txn
            .commit()
            .map_err(|e| transaction_error(&binding.substore, e))?;
        Ok(())
    }
}

fn transaction_error(bucket: &str, source: impl Into<redb::Error>) -> CacheError {
    CacheError::Transaction {
        bucket: bucket.to_string(),
        source: source.into(),
    }
}

/// Builds the sub-store name for a bucket: always the bucket name itself,
/// kept as a function so callers don't construct `KvBinding`s by hand.
pub fn binding_for(pool: &KvPool, name: &str, hash: u64) -> KvBinding {
    KvBinding {
        env_index: pool.env_index_for_hash(hash),
        substore: name.to_string(),
    }
}

/// Path to the partition directory for a given index, used only for
/// diagnostics (errors, logging).
pub fn partition_path(database_root: &Path, env_index: usize) -> PathBuf {
    database_root.join(format!("part_{env_index}"))
}
