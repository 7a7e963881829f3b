//! SQLite cache store
//!
//! Expiry instants are stored as RFC 3339 UTC strings with a fixed width, so
//! string comparison in SQL orders them chronologically.

use crate::cache::schema::initialize_schema;
use crate::cache::{CacheEntry, CacheError, CacheResult, CacheStore};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// [`CacheStore`] persisted in a SQLite database file
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteCache {
    /// Opens or creates the cache database at `path`
    pub fn open(path: &Path) -> CacheResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let row: Option<(Vec<u8>, String)> = self
            .conn()
            .query_row(
                "SELECT payload, expires_at FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(payload, expires_at)| {
            let expires_at = DateTime::parse_from_rfc3339(&expires_at)
                .map_err(|e| CacheError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                })?
                .with_timezone(&Utc);
            Ok(CacheEntry {
                key: key.to_string(),
                payload,
                expires_at,
            })
        })
        .transpose()
    }
}

impl CacheStore for SqliteCache {
    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let now = Utc::now();
        Ok(self.load(key)?.filter(|entry| !entry.is_expired(now)))
    }

    fn get_stale(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        self.load(key)
    }

    fn set(&self, key: &str, payload: &[u8], ttl: Duration) -> CacheResult<()> {
        let now = Utc::now();
        let entry = CacheEntry::new(key, payload, ttl, now);
        self.conn().execute(
            "INSERT INTO cache_entries (key, payload, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at",
            params![key, entry.payload, timestamp(now), timestamp(entry.expires_at)],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn purge_expired(&self) -> CacheResult<usize> {
        let removed = self.conn().execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            params![timestamp(Utc::now())],
        )?;
        if removed > 0 {
            tracing::debug!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }

    fn clear(&self) -> CacheResult<()> {
        self.conn().execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }

    fn len(&self) -> CacheResult<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
