//! Sub-Store Value Schema
//!
//! spec.md leaves the KV value schema as an open question ("the source
//! stores filename-as-value; a production implementation should define a
//! structured record"). This module resolves that question: each listing
//! entry is stored as a small `bincode`-encoded [`ObjectRecord`] rather than
//! a bare copy of the filename.
//!
//! `list_bucket` never decodes values — the cursor protocol only needs
//! keys — so this schema is free to grow without touching the paging
//! contract.

use serde::{Deserialize, Serialize};

/// Metadata captured for one listed object at fill/update time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// File size in bytes, as reported by the filesystem at observation time.
    pub size: u64,
    /// Last-modified time, seconds since the Unix epoch.
    pub mtime_unix_secs: i64,
}

impl ObjectRecord {
    /// Builds a record from filesystem metadata, defaulting to zero for
    /// whichever fields the platform could not report.
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let mtime_unix_secs = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            size: meta.len(),
            mtime_unix_secs,
        }
    }

    /// Encodes the record for storage as a KV value.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("ObjectRecord encoding is infallible")
    }

    /// Decodes a record previously produced by [`ObjectRecord::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
