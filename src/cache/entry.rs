//! Cache entry records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bookkeeping for one cached asset.
///
/// Created on the first successful fetch, touched on every hit, destroyed
/// on eviction or expiry sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Semantic key, `"{provider}:{normalized query}"`.
    pub key: String,

    /// Local file holding the asset bytes.
    pub path: PathBuf,

    /// Provider label the asset came from.
    pub source: String,

    /// Attribution line required by the provider license.
    pub attribution: String,

    /// Size of the backing file in bytes.
    pub size_bytes: u64,

    /// Number of cache hits since insertion.
    #[serde(default)]
    pub access_count: u64,

    /// Last insertion or hit.
    pub last_accessed: DateTime<Utc>,

    /// Absolute expiry; entries past it are eligible for sweeping.
    pub expires_at: DateTime<Utc>,

    /// Insertion sequence number, breaks `last_accessed` ties.
    #[serde(default)]
    pub seq: u64,
}

impl CacheEntry {
    /// Returns true if the entry is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Sort key for eviction: least recently accessed first, then oldest insert.
    pub fn lru_key(&self) -> (DateTime<Utc>, u64) {
        (self.last_accessed, self.seq)
    }
}
