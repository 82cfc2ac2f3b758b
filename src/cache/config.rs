//! Cache configuration.
//!
//! Controls the backing store, the TTL tiers and the warm-up shape via the
//! `[cache]` section of `touchline.toml`.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_SHORT_TTL_SECS: u64 = 300;
const DEFAULT_STANDARD_TTL_SECS: u64 = 300;
const DEFAULT_HOMEPAGE_SIZE: u32 = 5;
const DEFAULT_WARM_PAGES: u32 = 3;
const DEFAULT_WARM_PAGE_SIZE: u32 = 10;

/// Key-value store backing the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// In-process store; entries live as long as the process.
    #[default]
    Memory,
    /// Shared Redis instance.
    Redis,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(format!("unknown cache backend `{other}`")),
        }
    }
}

/// How listing entries are located when they must be flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationMode {
    /// Scan the store for keys under the listing prefix.
    #[default]
    PrefixScan,
    /// Track written listing keys in a process-local index.
    Indexed,
}

impl FromStr for InvalidationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prefix_scan" | "prefix-scan" => Ok(InvalidationMode::PrefixScan),
            "indexed" => Ok(InvalidationMode::Indexed),
            other => Err(format!("unknown invalidation mode `{other}`")),
        }
    }
}

/// Named expiry durations assigned by volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlTier {
    /// Homepage rollup.
    Short,
    /// Listing pages.
    Standard,
    /// Single published articles.
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlTiers {
    pub short: Duration,
    pub standard: Duration,
    pub long: Duration,
}

impl TtlTiers {
    pub fn ttl(&self, tier: TtlTier) -> Duration {
        match tier {
            TtlTier::Short => self.short,
            TtlTier::Standard => self.standard,
            TtlTier::Long => self.long,
        }
    }
}

impl Default for TtlTiers {
    fn default() -> Self {
        let standard = Duration::from_secs(DEFAULT_STANDARD_TTL_SECS);
        Self {
            short: Duration::from_secs(DEFAULT_SHORT_TTL_SECS),
            standard,
            long: standard * 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub ttls: TtlTiers,
    /// Number of articles in the homepage rollup.
    pub homepage_size: u32,
    /// Listing pages filled by the warmer.
    pub warm_pages: u32,
    pub warm_page_size: u32,
    pub warm_on_startup: bool,
    pub invalidation: InvalidationMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: None,
            ttls: TtlTiers::default(),
            homepage_size: DEFAULT_HOMEPAGE_SIZE,
            warm_pages: DEFAULT_WARM_PAGES,
            warm_page_size: DEFAULT_WARM_PAGE_SIZE,
            warm_on_startup: true,
            invalidation: InvalidationMode::default(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            ttls: TtlTiers {
                short: settings.short_ttl,
                standard: settings.standard_ttl,
                long: settings.long_ttl,
            },
            homepage_size: settings.homepage_size.get(),
            warm_pages: settings.warm_pages,
            warm_page_size: settings.warm_page_size.get(),
            warm_on_startup: settings.warm_on_startup,
            invalidation: settings.invalidation,
        }
    }
}
