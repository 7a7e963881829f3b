//! Cache store trait and entry type

use crate::cache::CacheResult;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A stored payload and its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: &str, payload: &[u8], ttl: Duration, now: DateTime<Utc>) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        Self {
            key: key.to_string(),
            payload: payload.to_vec(),
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// An entry is expired from its expiry instant onwards
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Key/value store with per-entry expiry
///
/// Implementations must be safe to share between concurrent analyses.
pub trait CacheStore: Send + Sync {
    /// Returns the entry if it exists and has not expired
    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Returns the entry even if it has expired
    fn get_stale(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Stores `payload` under `key`, replacing any previous entry
    fn set(&self, key: &str, payload: &[u8], ttl: Duration) -> CacheResult<()>;

    fn remove(&self, key: &str) -> CacheResult<bool>;

    /// Deletes expired entries, returning how many were removed
    fn purge_expired(&self) -> CacheResult<usize>;

    fn clear(&self) -> CacheResult<()>;

    /// Number of stored entries, expired ones included
    fn len(&self) -> CacheResult<usize>;

    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let entry = CacheEntry::new("k", b"", Duration::from_secs(10), now);
        assert!(!entry.is_expired(now));
        assert!(entry.is_expired(now + chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let now = Utc::now();
        assert!(CacheEntry::new("k", b"", Duration::ZERO, now).is_expired(now));
    }
}
