//! Typed, failure-tolerant access to the cache store.
//!
//! The cache is purely an optimization: every store or codec failure is logged
//! and degrades to a miss (reads) or a skipped write.

use std::sync::Arc;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::config::{TtlTier, TtlTiers};
use super::keys::key_scope;
use super::store::CacheStore;

pub const METRIC_CACHE_HIT: &str = "touchline_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "touchline_cache_miss_total";
pub const METRIC_CACHE_STORE_ERROR: &str = "touchline_cache_store_error_total";
pub const METRIC_CACHE_INVALIDATED: &str = "touchline_cache_invalidated_keys_total";

const SOURCE: &str = "touchline::cache";

#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn CacheStore>,
    ttls: TtlTiers,
}

impl CacheClient {
    pub fn new(store: Arc<dyn CacheStore>, ttls: TtlTiers) -> Self {
        Self { store, ttls }
    }

    pub fn ttls(&self) -> TtlTiers {
        self.ttls
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let scope = key_scope(key);
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                counter!(METRIC_CACHE_MISS, "scope" => scope).increment(1);
                return None;
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    key,
                    error = %err,
                    "cache read failed; treating as miss"
                );
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "get").increment(1);
                counter!(METRIC_CACHE_MISS, "scope" => scope).increment(1);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT, "scope" => scope).increment(1);
                Some(value)
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    key,
                    error = %err,
                    "cached value could not be decoded; treating as miss"
                );
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "decode").increment(1);
                counter!(METRIC_CACHE_MISS, "scope" => scope).increment(1);
                None
            }
        }
    }

    /// Store `value` under `key`, returning whether the write landed.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, tier: TtlTier) -> bool {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    key,
                    error = %err,
                    "value could not be encoded; skipping cache write"
                );
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "encode").increment(1);
                return false;
            }
        };

        let ttl = self.ttls.ttl(tier);
        match self.store.set_ex(key, payload, ttl).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    key,
                    ttl_secs = ttl.as_secs(),
                    error = %err,
                    "cache write failed; skipping"
                );
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "set").increment(1);
                false
            }
        }
    }

    /// Delete the given keys.
    ///
    /// Returns how many live entries were removed, or `None` when the store
    /// rejected the delete.
    pub async fn delete(&self, keys: &[String]) -> Option<usize> {
        if keys.is_empty() {
            return Some(0);
        }
        match self.store.del(keys).await {
            Ok(removed) => {
                counter!(METRIC_CACHE_INVALIDATED).increment(removed as u64);
                Some(removed)
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    keys = keys.len(),
                    error = %err,
                    "cache delete failed"
                );
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "del").increment(1);
                None
            }
        }
    }

    /// Delete one key, returning 1 when it held a live entry.
    pub async fn delete_one(&self, key: &str) -> usize {
        self.delete(&[key.to_string()]).await.unwrap_or(0)
    }

    /// Delete every key matching `pattern`, returning how many were removed.
    pub async fn delete_matching(&self, pattern: &str) -> usize {
        let keys = match self.store.keys(pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    pattern,
                    error = %err,
                    "cache key scan failed"
                );
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "keys").increment(1);
                return 0;
            }
        };

        if keys.is_empty() {
            return 0;
        }

        let removed = self.delete(&keys).await.unwrap_or(0);
        debug!(target = SOURCE, pattern, removed, "flushed cache keys");
        removed
    }
}
