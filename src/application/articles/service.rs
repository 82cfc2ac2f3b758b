use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::pagination::{PageRequest, PaginatedResult};
use crate::application::repos::{ArticlesRepo, FindOptions, RepoError};
use crate::cache::keys::{self, HOMEPAGE_KEY};
use crate::cache::{CacheClient, CacheConfig, ListingInvalidation, TtlTier};
use crate::domain::entities::ArticleRecord;

use super::query::{ArticleFilters, SortSpec};

pub const METRIC_CACHE_WARM_MS: &str = "touchline_cache_warm_ms";

const SOURCE: &str = "touchline::articles";

/// Outcome of a best-effort warm pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmSummary {
    pub listing_pages: u32,
    pub homepage: bool,
    pub failures: u32,
}

/// Read-through cache over the published article catalog.
///
/// Reads check the cache first and fall back to the repository on a miss;
/// writers call [`ArticleService::invalidate`] after persisting so listings and
/// the homepage never outlive the content they mirror.
pub struct ArticleService {
    repo: Arc<dyn ArticlesRepo>,
    cache: CacheClient,
    invalidation: ListingInvalidation,
    homepage_size: u32,
    warm_pages: u32,
    warm_page_size: u32,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn ArticlesRepo>, cache: CacheClient, config: &CacheConfig) -> Self {
        Self {
            repo,
            cache,
            invalidation: ListingInvalidation::from_mode(
                config.invalidation,
                config.ttls.standard,
            ),
            homepage_size: config.homepage_size.max(1),
            warm_pages: config.warm_pages,
            warm_page_size: config.warm_page_size.max(1),
        }
    }

    pub fn cache(&self) -> &CacheClient {
        &self.cache
    }

    /// Latest published articles for the homepage rollup.
    pub async fn fetch_homepage(&self) -> Result<Vec<ArticleRecord>, RepoError> {
        if let Some(cached) = self.cache.get_json::<Vec<ArticleRecord>>(HOMEPAGE_KEY).await {
            return Ok(cached);
        }

        let request = PageRequest::first(self.homepage_size);
        let page = self
            .repo
            .find_published(&ArticleFilters::new(), SortSpec::default(), request)
            .await
            .map_err(|err| {
                error!(
                    target = SOURCE,
                    limit = request.limit(),
                    error = %err,
                    "failed to load homepage articles"
                );
                err
            })?;

        self.cache
            .set_json(HOMEPAGE_KEY, &page.data, TtlTier::Short)
            .await;
        Ok(page.data)
    }

    /// One page of published articles.
    pub async fn fetch_published(
        &self,
        page: PageRequest,
        filters: &ArticleFilters,
        sort: SortSpec,
    ) -> Result<PaginatedResult<ArticleRecord>, RepoError> {
        let key = keys::listing_key(page, filters, sort);
        if let Some(cached) = self
            .cache
            .get_json::<PaginatedResult<ArticleRecord>>(&key)
            .await
        {
            return Ok(cached);
        }

        let repo_page = self
            .repo
            .find_published(filters, sort, page)
            .await
            .map_err(|err| {
                error!(
                    target = SOURCE,
                    page = page.page(),
                    limit = page.limit(),
                    filters = %keys::filter_segment(filters),
                    sort_by = sort.field.as_str(),
                    sort_order = sort.order.as_str(),
                    error = %err,
                    "failed to load published articles"
                );
                err
            })?;

        let result = PaginatedResult::from_repo_page(repo_page, page.limit());
        if self.cache.set_json(&key, &result, TtlTier::Standard).await {
            self.invalidation.record(&key);
        }

        // The homepage mirrors the head of the default listing.
        if keys::is_default_listing(page, filters, sort) {
            self.cache.delete_one(HOMEPAGE_KEY).await;
        }

        Ok(result)
    }

    /// A single article, or `None` when it does not exist.
    ///
    /// Published articles loaded from the repository are cached and have their
    /// view counter bumped in the background; cache hits are not counted.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<ArticleRecord>, RepoError> {
        let key = keys::item_key(id);
        if let Some(cached) = self.cache.get_json::<ArticleRecord>(&key).await {
            return Ok(Some(cached));
        }

        let article = self
            .repo
            .find_by_id(id, FindOptions::with_author())
            .await
            .map_err(|err| {
                error!(
                    target = SOURCE,
                    id = %id,
                    error = %err,
                    "failed to load article"
                );
                err
            })?;

        let Some(article) = article else {
            return Ok(None);
        };

        if article.is_published() {
            self.cache.set_json(&key, &article, TtlTier::Long).await;
            self.spawn_view_count(id);
        }

        Ok(Some(article))
    }

    fn spawn_view_count(&self, id: Uuid) {
        let repo = Arc::clone(&self.repo);
        tokio::spawn(async move {
            if let Err(err) = repo.increment_view_count(id).await {
                warn!(
                    target = SOURCE,
                    id = %id,
                    error = %err,
                    "failed to increment view count"
                );
            }
        });
    }

    /// Drop cached state affected by a write.
    ///
    /// Always flushes every listing and the homepage; also drops the item entry
    /// when `id` is given.
    pub async fn invalidate(&self, id: Option<Uuid>) {
        let mut removed = 0usize;
        if let Some(id) = id {
            removed += self.cache.delete_one(&keys::item_key(id)).await;
        }
        removed += self.invalidation.flush(&self.cache).await;
        removed += self.cache.delete_one(HOMEPAGE_KEY).await;

        debug!(
            target = SOURCE,
            id = ?id,
            strategy = ?self.invalidation.mode(),
            removed,
            "invalidated article caches"
        );
    }

    /// Pre-populate listing pages and the homepage. Never fails.
    ///
    /// Listings go first because refilling the default page drops the homepage
    /// entry.
    pub async fn warm_cache(&self) -> WarmSummary {
        let started_at = Instant::now();
        let mut summary = WarmSummary::default();
        let filters = ArticleFilters::new();

        for page_number in 1..=self.warm_pages {
            let request = match PageRequest::new(page_number, self.warm_page_size) {
                Ok(request) => request,
                Err(err) => {
                    warn!(target = SOURCE, error = %err, "invalid warm page request");
                    summary.failures += 1;
                    break;
                }
            };

            match self
                .fetch_published(request, &filters, SortSpec::default())
                .await
            {
                Ok(result) => {
                    summary.listing_pages += 1;
                    if !result.has_next {
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        page = page_number,
                        error = %err,
                        "failed to warm listing page"
                    );
                    summary.failures += 1;
                }
            }
        }

        match self.fetch_homepage().await {
            Ok(_) => summary.homepage = true,
            Err(err) => {
                warn!(target = SOURCE, error = %err, "failed to warm homepage");
                summary.failures += 1;
            }
        }

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_CACHE_WARM_MS).record(elapsed_ms);
        info!(
            target = SOURCE,
            listing_pages = summary.listing_pages,
            homepage = summary.homepage,
            failures = summary.failures,
            elapsed_ms,
            "article cache warmed"
        );

        summary
    }
}
