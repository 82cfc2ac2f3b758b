//! In-process cache store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::store::{CacheStore, CacheStoreError, KeyPattern, ttl_seconds};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// DashMap-backed store with lazy expiry.
///
/// Expired entries are invisible to every read and are removed when touched
/// or by [`MemoryCacheStore::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set_ex(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds(ttl));
        self.entries
            .insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<usize, CacheStoreError> {
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, entry)| !entry.is_expired(now))
            .count();
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheStoreError> {
        let pattern = KeyPattern::parse(pattern)?;
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut matched = Vec::new();

        for entry in self.entries.iter() {
            if !pattern.matches(entry.key()) {
                continue;
            }
            if entry.value().is_expired(now) {
                expired.push(entry.key().clone());
            } else {
                matched.push(entry.key().clone());
            }
        }

        for key in expired {
            self.entries
                .remove_if(&key, |_, entry| entry.is_expired(now));
        }

        matched.sort();
        Ok(matched)
    }
}
