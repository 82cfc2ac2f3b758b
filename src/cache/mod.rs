//! Touchline content cache plumbing.
//!
//! - [`CacheStore`]: string key-value store with per-entry TTL, implemented by
//!   [`MemoryCacheStore`] and [`RedisCacheStore`]
//! - [`CacheClient`]: typed JSON access that degrades to a miss on any failure
//! - [`keys`]: canonical key derivation for homepage, item and listing entries
//! - [`ListingInvalidation`]: prefix-scan or indexed flushing of listings
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379"
//! standard_ttl_seconds = 300
//! invalidation = "prefix_scan"
//! ```

mod client;
mod config;
mod invalidation;
pub mod keys;
mod memory_store;
mod redis_store;
mod store;

pub use client::{
    CacheClient, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS,
    METRIC_CACHE_STORE_ERROR,
};
pub use config::{CacheBackend, CacheConfig, InvalidationMode, TtlTier, TtlTiers};
pub use invalidation::{ListingInvalidation, ListingKeyIndex};
pub use memory_store::MemoryCacheStore;
pub use redis_store::RedisCacheStore;
pub use store::{CacheStore, CacheStoreError, KeyPattern, ttl_seconds};
