//! Strategies for flushing listing entries.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::client::CacheClient;
use super::config::InvalidationMode;
use super::keys::LISTING_PATTERN;
use super::store::ttl_seconds;

/// Process-local record of listing keys written to the store.
///
/// Only sees writes made by this process. Each key is remembered for as long as
/// its store entry can live, and expired keys are swept out on `record` at most
/// once per TTL.
#[derive(Debug)]
pub struct ListingKeyIndex {
    keys: DashMap<String, Instant>,
    ttl: Duration,
    next_sweep: Mutex<Instant>,
}

impl ListingKeyIndex {
    pub fn new(ttl: Duration) -> Self {
        let ttl = Duration::from_secs(ttl_seconds(ttl));
        Self {
            keys: DashMap::new(),
            ttl,
            next_sweep: Mutex::new(Instant::now() + ttl),
        }
    }

    pub fn record(&self, key: &str) {
        let now = Instant::now();
        self.keys.insert(key.to_string(), now + self.ttl);
        self.sweep_if_due(now);
    }

    fn sweep_if_due(&self, now: Instant) {
        // Concurrent recorders skip the sweep instead of waiting on it.
        let Ok(mut next_sweep) = self.next_sweep.try_lock() else {
            return;
        };
        if now < *next_sweep {
            return;
        }
        self.keys.retain(|_, expires_at| *expires_at > now);
        *next_sweep = now + self.ttl;
    }

    fn take_live(&self) -> Vec<(String, Instant)> {
        let now = Instant::now();
        let snapshot: Vec<String> = self.keys.iter().map(|entry| entry.key().clone()).collect();
        snapshot
            .into_iter()
            .filter_map(|key| self.keys.remove(&key))
            .filter(|(_, expires_at)| *expires_at > now)
            .collect()
    }

    fn restore(&self, entries: Vec<(String, Instant)>) {
        for (key, expires_at) in entries {
            self.keys.entry(key).or_insert(expires_at);
        }
    }

    /// Remove every recorded key, returning those whose entries may still be live.
    ///
    /// Keys recorded concurrently with the drain are left for the next one.
    pub fn drain(&self) -> Vec<String> {
        self.take_live().into_iter().map(|(key, _)| key).collect()
    }

    /// Number of keys currently held, expired or not.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum ListingInvalidation {
    PrefixScan,
    Indexed(Arc<ListingKeyIndex>),
}

impl ListingInvalidation {
    /// `listing_ttl` is the expiry listing entries are written with.
    pub fn from_mode(mode: InvalidationMode, listing_ttl: Duration) -> Self {
        match mode {
            InvalidationMode::PrefixScan => ListingInvalidation::PrefixScan,
            InvalidationMode::Indexed => {
                ListingInvalidation::Indexed(Arc::new(ListingKeyIndex::new(listing_ttl)))
            }
        }
    }

    pub fn mode(&self) -> InvalidationMode {
        match self {
            ListingInvalidation::PrefixScan => InvalidationMode::PrefixScan,
            ListingInvalidation::Indexed(_) => InvalidationMode::Indexed,
        }
    }

    /// Note a listing key that was just written to the store.
    pub fn record(&self, key: &str) {
        if let ListingInvalidation::Indexed(index) = self {
            index.record(key);
        }
    }

    /// Delete every listing entry, returning how many keys were removed.
    pub async fn flush(&self, cache: &CacheClient) -> usize {
        match self {
            ListingInvalidation::PrefixScan => cache.delete_matching(LISTING_PATTERN).await,
            ListingInvalidation::Indexed(index) => {
                let entries = index.take_live();
                let keys: Vec<String> = entries.iter().map(|(key, _)| key.clone()).collect();
                match cache.delete(&keys).await {
                    Some(removed) => removed,
                    None => {
                        // Put the keys back so the next flush retries them.
                        index.restore(entries);
                        0
                    }
                }
            }
        }
    }
}
