//! Key-value store abstraction behind the content cache.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported key pattern `{0}`")]
    InvalidPattern(String),
}

impl CacheStoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// String-keyed store with per-entry expiry.
///
/// Implementations own their connection handle; callers share one instance for
/// the process lifetime.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError>;

    async fn set_ex(&self, key: &str, value: String, ttl: Duration)
    -> Result<(), CacheStoreError>;

    /// Delete every listed key and return how many existed. An empty slice is a no-op.
    async fn del(&self, keys: &[String]) -> Result<usize, CacheStoreError>;

    /// Keys matching `pattern`: an exact key, or a prefix ending in one `*`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheStoreError>;
}

/// Parsed form of the patterns accepted by [`CacheStore::keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern<'a> {
    Exact(&'a str),
    Prefix(&'a str),
}

impl<'a> KeyPattern<'a> {
    pub fn parse(pattern: &'a str) -> Result<Self, CacheStoreError> {
        match pattern.strip_suffix('*') {
            Some(prefix) if !prefix.contains('*') => Ok(KeyPattern::Prefix(prefix)),
            Some(_) => Err(CacheStoreError::InvalidPattern(pattern.to_string())),
            None if pattern.contains('*') => {
                Err(CacheStoreError::InvalidPattern(pattern.to_string()))
            }
            None => Ok(KeyPattern::Exact(pattern)),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => key == *exact,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

/// Whole seconds for a TTL, never below one.
pub fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs.saturating_add(1).max(1)
    } else {
        secs.max(1)
    }
}
