//! Record stores for cache entries.
//!
//! The cache treats its record storage as an opaque collaborator. Two
//! implementations are provided: an in-memory map and a JSON index file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DaemonError, Result};

use super::entry::CacheEntry;

/// Storage for cache entry records, keyed by `CacheEntry::key`.
pub trait CacheStore {
    /// Returns every stored entry.
    fn list_all(&self) -> Result<Vec<CacheEntry>>;

    /// Inserts or replaces the entry with the same key.
    fn upsert(&mut self, entry: &CacheEntry) -> Result<()>;

    /// Removes the entry with the same key. Removing a missing key is not an error.
    fn delete(&mut self, entry: &CacheEntry) -> Result<()>;

    /// Looks up a single entry.
    fn find(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.list_all()?.into_iter().find(|e| e.key == key))
    }
}

/// In-memory store. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn list_all(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.entries.values().cloned().collect())
    }

    fn upsert(&mut self, entry: &CacheEntry) -> Result<()> {
        self.entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn delete(&mut self, entry: &CacheEntry) -> Result<()> {
        self.entries.remove(&entry.key);
        Ok(())
    }

    fn find(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).cloned())
    }
}

/// Store backed by a JSON index file.
///
/// The whole index is rewritten on every mutation through a temporary file
/// and a rename, so a crash leaves either the old or the new index.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

impl JsonFileStore {
    /// Opens the index at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read(&path).map_err(|e| {
                DaemonError::cache_io(format!("Failed to read cache index {}", path.display()), e)
            })?;
            let list: Vec<CacheEntry> = serde_json::from_slice(&raw).map_err(|e| {
                DaemonError::store_failed(format!(
                    "Corrupt cache index {}: {}",
                    path.display(),
                    e
                ))
            })?;
            list.into_iter().map(|e| (e.key.clone(), e)).collect()
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened cache index");
        Ok(Self { path, entries })
    }

    /// Returns the index file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DaemonError::cache_io(
                    format!("Failed to create index directory {}", parent.display()),
                    e,
                )
            })?;
        }

        let list: Vec<&CacheEntry> = self.entries.values().collect();
        let json = serde_json::to_vec_pretty(&list)
            .map_err(|e| {
                DaemonError::store_failed(format!("Failed to encode cache index: {}", e))
            })?;

        let tmp = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            DaemonError::cache_io(
                format!("Failed to write cache index {}", self.path.display()),
                e,
            )
        })
    }
}

impl CacheStore for JsonFileStore {
    fn list_all(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.entries.values().cloned().collect())
    }

    fn upsert(&mut self, entry: &CacheEntry) -> Result<()> {
        let previous = self.entries.insert(entry.key.clone(), entry.clone());
        if let Err(e) = self.persist() {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(prev) => self.entries.insert(prev.key.clone(), prev),
                None => self.entries.remove(&entry.key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&mut self, entry: &CacheEntry) -> Result<()> {
        let Some(previous) = self.entries.remove(&entry.key) else {
            return Ok(());
        };
        if let Err(e) = self.persist() {
            self.entries.insert(previous.key.clone(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn find(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).cloned())
    }
}
