//! Cache store for analysis results and provider answers
//!
//! This module handles:
//! - Deterministic cache key derivation
//! - The [`CacheStore`] interface injected into the analyzer
//! - An in-process store and a SQLite-backed store
//!
//! Entries are opaque byte payloads with an expiry. Expired entries are
//! invisible to [`CacheStore::get`] but stay readable through
//! [`CacheStore::get_stale`] until they are purged.

mod key;
mod memory;
mod schema;
mod sqlite;
mod traits;

pub use key::{analysis_key, provider_key};
pub use memory::{MemoryCache, DEFAULT_CAPACITY};
pub use sqlite::SqliteCache;
pub use traits::{CacheEntry, CacheStore};

use crate::config::{CacheBackend, CacheConfig};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by cache stores
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid cache entry {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Opens the store selected by the configuration
pub fn open_cache(config: &CacheConfig) -> CacheResult<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::with_capacity(config.max_entries))),
        CacheBackend::Sqlite => {
            let store = SqliteCache::open(Path::new(&config.database_path))?;
            tracing::debug!("Opened SQLite cache at {}", config.database_path);
            Ok(Arc::new(store))
        }
    }
}
