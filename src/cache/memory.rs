//! In-process cache store
//!
//! Holds at most `capacity` entries. Inserting a new key into a full store
//! evicts the entry that expires first, so expired (stale) entries go before
//! live ones.

use crate::cache::{CacheEntry, CacheResult, CacheStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded [`CacheStore`] backed by a hash map; contents are lost on exit
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding at most `capacity` entries (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let now = Utc::now();
        Ok(self
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .cloned())
    }

    fn get_stale(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(self.read().get(key).cloned())
    }

    fn set(&self, key: &str, payload: &[u8], ttl: Duration) -> CacheResult<()> {
        let entry = CacheEntry::new(key, payload, ttl, Utc::now());
        let mut entries = self.write();
        if !entries.contains_key(key) {
            while entries.len() >= self.capacity {
                let Some(victim) = entries
                    .values()
                    .min_by_key(|entry| entry.expires_at)
                    .map(|entry| entry.key.clone())
                else {
                    break;
                };
                tracing::debug!("Memory cache full, evicting {}", victim);
                entries.remove(&victim);
            }
        }
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<bool> {
        Ok(self.write().remove(key).is_some())
    }

    fn purge_expired(&self) -> CacheResult<usize> {
        let now = Utc::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }

    fn clear(&self) -> CacheResult<()> {
        self.write().clear();
        Ok(())
    }

    fn len(&self) -> CacheResult<usize> {
        Ok(self.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let cache = MemoryCache::new();
        assert!(cache.get("a").unwrap().is_none());

        cache.set("a", b"one", Duration::from_secs(60)).unwrap();
        cache.set("a", b"two", Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("a").unwrap().unwrap().payload, b"two");
        assert_eq!(cache.len().unwrap(), 1);

        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_full_store_evicts_earliest_expiry() {
        let cache = MemoryCache::with_capacity(3);
        cache.set("stale", b"0", Duration::ZERO).unwrap();
        cache.set("short", b"1", Duration::from_secs(60)).unwrap();
        cache.set("long", b"2", Duration::from_secs(3600)).unwrap();

        cache.set("next", b"3", Duration::from_secs(600)).unwrap();
        assert_eq!(cache.len().unwrap(), 3);
        assert!(cache.get_stale("stale").unwrap().is_none());

        cache.set("last", b"4", Duration::from_secs(600)).unwrap();
        assert_eq!(cache.len().unwrap(), 3);
        assert!(cache.get("short").unwrap().is_none());
        assert!(cache.get("long").unwrap().is_some());
    }

    #[test]
    fn test_overwrite_in_full_store_keeps_others() {
        let cache = MemoryCache::with_capacity(2);
        cache.set("a", b"1", Duration::from_secs(60)).unwrap();
        cache.set("b", b"2", Duration::from_secs(60)).unwrap();
        cache.set("a", b"3", Duration::from_secs(60)).unwrap();
        assert_eq!(cache.len().unwrap(), 2);
        assert_eq!(cache.get("b").unwrap().unwrap().payload, b"2");
    }

    #[test]
    fn test_expired_entries_are_stale_until_purged() {
        let cache = MemoryCache::new();
        cache.set("old", b"stale", Duration::ZERO).unwrap();
        cache.set("new", b"fresh", Duration::from_secs(60)).unwrap();

        assert!(cache.get("old").unwrap().is_none());
        assert_eq!(cache.get_stale("old").unwrap().unwrap().payload, b"stale");

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert!(cache.get_stale("old").unwrap().is_none());
        assert_eq!(cache.len().unwrap(), 1);

        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }
}
