//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use super::store::{CacheStore, CacheStoreError, KeyPattern, ttl_seconds};

/// Shared Redis connection reused for the process lifetime.
///
/// `ConnectionManager` multiplexes one connection and reconnects on failure.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(url: &str) -> Result<Self, CacheStoreError> {
        let client = redis::Client::open(url).map_err(CacheStoreError::unavailable)?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(CacheStoreError::unavailable)?;
        info!(
            target = "touchline::cache::redis",
            "connected to redis cache store"
        );
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(CacheStoreError::unavailable)
    }

    async fn set_ex(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(key, value, ttl_seconds(ttl))
            .await
            .map_err(CacheStoreError::unavailable)?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<usize, CacheStoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        conn.del(keys).await.map_err(CacheStoreError::unavailable)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheStoreError> {
        // Only exact keys and trailing-`*` prefixes are accepted.
        KeyPattern::parse(pattern)?;
        let mut conn = self.connection.clone();
        conn.keys(pattern)
            .await
            .map_err(CacheStoreError::unavailable)
    }
}
