//! Cache module for downloaded media.
//!
//! Provides a size- and age-bounded LRU cache for provider images:
//! - [`entry`]: the per-asset bookkeeping record
//! - [`store`]: record storage (in-memory or JSON index file)
//! - [`lru`]: eviction, expiry sweeping and statistics

pub mod entry;
pub mod lru;
pub mod store;

// Re-export commonly used types
pub use entry::CacheEntry;
pub use lru::{CacheStats, EvictionReport, ImageCache};
pub use store::{CacheStore, JsonFileStore, MemoryStore};
