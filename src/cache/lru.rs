//! Size-bounded LRU cache for downloaded assets.
//!
//! Two independent policies keep the cache small:
//! - age: every entry expires a fixed time after insertion and is removed
//!   by [`ImageCache::sweep_expired`];
//! - capacity: after each insert, least-recently-accessed entries are
//!   evicted until the total size is at or under the ceiling.
//!
//! Eviction order is ascending `(last_accessed, seq)`, so entries touched
//! at the same instant leave in insertion order.
//!
//! All mutation goes through `&mut self`; whoever owns the cache is the
//! single writer, so capacity enforcement never races with an insert.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{DaemonError, Result};
use crate::types::content_hash;

use super::entry::CacheEntry;
use super::store::CacheStore;

/// Entries removed by one eviction or sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Keys removed, in removal order.
    pub evicted: Vec<String>,
    /// Bytes accounted to the removed entries.
    pub freed_bytes: u64,
    /// Total size of the entries left behind.
    pub remaining_bytes: u64,
}

/// Point-in-time summary of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub stale_entries: usize,
}

/// Asset cache over a record store and a directory of key-addressed files.
pub struct ImageCache<S: CacheStore> {
    store: S,
    dir: PathBuf,
    extension: String,
    max_bytes: u64,
    max_age: Duration,
    next_seq: u64,
}

impl<S: CacheStore> ImageCache<S> {
    /// Creates a cache storing files under `dir` with the given limits.
    ///
    /// The insertion counter resumes after the highest `seq` already in
    /// the store.
    pub fn new(
        store: S,
        dir: impl Into<PathBuf>,
        max_bytes: u64,
        max_age: Duration,
    ) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            DaemonError::cache_io(format!("Failed to create cache directory {}", dir.display()), e)
        })?;

        let next_seq = store
            .list_all()?
            .iter()
            .map(|e| e.seq)
            .max()
            .map_or(1, |s| s + 1);

        Ok(Self {
            store,
            dir,
            extension: "jpg".to_string(),
            max_bytes,
            max_age,
            next_seq,
        })
    }

    /// Sets the file extension used for new entries.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Returns the configured size ceiling.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Returns the directory holding cached files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path used for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", content_hash(key, 32), self.extension))
    }

    /// Looks up `key`, marking it most recently used.
    pub fn get(&mut self, key: &str) -> Result<Option<CacheEntry>> {
        self.get_at(key, Utc::now())
    }

    /// Looks up `key` as of `now`.
    ///
    /// A hit bumps `access_count` and sets `last_accessed = now`. Stale
    /// entries are still returned; callers needing freshness check
    /// `expires_at` themselves.
    pub fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let Some(mut entry) = self.store.find(key)? else {
            return Ok(None);
        };

        entry.access_count += 1;
        entry.last_accessed = now;
        self.store.upsert(&entry)?;

        debug!(key, access_count = entry.access_count, "Cache hit");
        Ok(Some(entry))
    }

    /// Stores `bytes` under `key` and enforces the size ceiling.
    pub fn put(
        &mut self,
        key: &str,
        bytes: &[u8],
        source: &str,
        attribution: &str,
    ) -> Result<CacheEntry> {
        self.put_at(key, bytes, source, attribution, Utc::now())
    }

    /// Stores `bytes` under `key` as of `now`.
    ///
    /// Replaces any existing entry for the key. The returned entry may
    /// already be evicted when it alone exceeds the ceiling.
    pub fn put_at(
        &mut self,
        key: &str,
        bytes: &[u8],
        source: &str,
        attribution: &str,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry> {
        let expires_at = now.checked_add_signed(self.max_age).ok_or_else(|| {
            DaemonError::store_failed(format!(
                "Cache lifetime of {} days is out of range",
                self.max_age.num_days()
            ))
        })?;

        let path = self.path_for(key);
        fs::write(&path, bytes).map_err(|e| {
            DaemonError::cache_io(format!("Failed to write cached file {}", path.display()), e)
        })?;

        let entry = CacheEntry {
            key: key.to_string(),
            path,
            source: source.to_string(),
            attribution: attribution.to_string(),
            size_bytes: bytes.len() as u64,
            access_count: 0,
            last_accessed: now,
            expires_at,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        self.store.upsert(&entry)?;
        info!(key, path = %entry.path.display(), size = entry.size_bytes, "Cached asset");

        let report = self.enforce_capacity(self.max_bytes)?;
        if report.evicted.iter().any(|k| k == key) {
            warn!(
                key,
                size = entry.size_bytes,
                max = self.max_bytes,
                "New entry exceeds cache ceiling and was evicted"
            );
        }

        Ok(entry)
    }

    /// Evicts least-recently-accessed entries until the total size is at
    /// or under `max_bytes`.
    pub fn enforce_capacity(&mut self, max_bytes: u64) -> Result<EvictionReport> {
        let mut entries = self.store.list_all()?;
        let mut total: u64 = entries.iter().map(|e| e.size_bytes).sum();
        let mut report = EvictionReport::default();

        if total <= max_bytes {
            report.remaining_bytes = total;
            return Ok(report);
        }

        entries.sort_by_key(CacheEntry::lru_key);
        for entry in entries {
            if total <= max_bytes {
                break;
            }
            self.evict(&entry)?;
            total -= entry.size_bytes;
            report.freed_bytes += entry.size_bytes;
            info!(
                key = %entry.key,
                path = %entry.path.display(),
                size = entry.size_bytes,
                "Evicted cache entry"
            );
            report.evicted.push(entry.key);
        }

        report.remaining_bytes = total;
        info!(
            freed = report.freed_bytes,
            remaining = total,
            max = max_bytes,
            "Cache cleanup finished"
        );
        Ok(report)
    }

    /// Removes every entry whose expiry is before the current time.
    pub fn sweep_expired(&mut self) -> Result<EvictionReport> {
        self.sweep_expired_at(Utc::now())
    }

    /// Removes every entry with `expires_at < now`, regardless of size.
    pub fn sweep_expired_at(&mut self, now: DateTime<Utc>) -> Result<EvictionReport> {
        let entries = self.store.list_all()?;
        let mut report = EvictionReport::default();

        for entry in entries {
            if entry.is_expired_at(now) {
                self.evict(&entry)?;
                report.freed_bytes += entry.size_bytes;
                report.evicted.push(entry.key);
            } else {
                report.remaining_bytes += entry.size_bytes;
            }
        }

        if !report.evicted.is_empty() {
            info!(
                count = report.evicted.len(),
                freed = report.freed_bytes,
                "Cleaned up expired cache entries"
            );
        }
        Ok(report)
    }

    /// Removes `key` if present. Returns true when something was removed.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        match self.store.find(key)? {
            Some(entry) => {
                self.evict(&entry)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Summarises the cache as of `now`.
    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<CacheStats> {
        let entries = self.store.list_all()?;
        Ok(CacheStats {
            entries: entries.len(),
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            max_bytes: self.max_bytes,
            stale_entries: entries.iter().filter(|e| e.is_expired_at(now)).count(),
        })
    }

    /// Summarises the cache as of the current time.
    pub fn stats(&self) -> Result<CacheStats> {
        self.stats_at(Utc::now())
    }

    /// Deletes the backing file, then the record.
    ///
    /// A failed file delete is logged and the record is removed anyway,
    /// which can leave an orphan file on disk. A failed record delete is
    /// logged as an inconsistency and returned.
    fn evict(&mut self, entry: &CacheEntry) -> Result<()> {
        match fs::remove_file(&entry.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %entry.path.display(), "Cached file already gone");
            }
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "Error deleting cached file");
            }
        }

        if let Err(e) = self.store.delete(entry) {
            error!(
                key = %entry.key,
                path = %entry.path.display(),
                error = %e,
                "Cache record still points at a deleted file"
            );
            return Err(e);
        }
        Ok(())
    }
}
