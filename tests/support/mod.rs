//! In-memory fakes shared by the integration tests.
#![allow(dead_code)]

use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::{OffsetDateTime, macros::datetime};
use tokio::sync::Mutex;
use uuid::Uuid;

use touchline::application::articles::{
    ArticleCommands, ArticleFilters, ArticleService, SortField, SortOrder, SortSpec,
};
use touchline::application::pagination::{PageRequest, RepoPage};
use touchline::application::repos::{
    ArticlesRepo, ArticlesWriteRepo, CreateArticleParams, FindOptions, HealthRepo, RepoError,
    UpdateArticleParams, UpdateArticleStatusParams,
};
use touchline::cache::{
    CacheClient, CacheConfig, CacheStore, CacheStoreError, InvalidationMode, MemoryCacheStore,
};
use touchline::domain::entities::{ArticleRecord, AuthorRef};
use touchline::domain::types::ArticleStatus;

pub const BASE_TIME: OffsetDateTime = datetime!(2020-03-01 12:00 UTC);

pub fn author_id() -> Uuid {
    Uuid::from_u128(0xa11ce)
}

pub fn article(index: u32, tags: &[&str], status: ArticleStatus) -> ArticleRecord {
    let published_at = BASE_TIME + time::Duration::hours(i64::from(index));
    ArticleRecord {
        id: Uuid::from_u128(u128::from(index) + 1),
        slug: format!("article-{index}"),
        title: format!("Article {index}"),
        excerpt: format!("Excerpt {index}"),
        body: format!("Match report number {index}"),
        status,
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        author: AuthorRef {
            id: author_id(),
            display_name: Some("Press Office".to_string()),
        },
        published_at: status.is_published().then_some(published_at),
        view_count: 0,
        created_at: BASE_TIME,
        updated_at: BASE_TIME,
    }
}

/// Five academy stories, three first-team stories and one draft.
pub fn sample_catalog() -> Vec<ArticleRecord> {
    let mut articles = Vec::new();
    for index in 0..5 {
        articles.push(article(index, &["academy"], ArticleStatus::Published));
    }
    for index in 5..8 {
        articles.push(article(index, &["first-team"], ArticleStatus::Published));
    }
    articles.push(article(8, &["academy"], ArticleStatus::Draft));
    articles
}

pub fn numbered_catalog(count: u32) -> Vec<ArticleRecord> {
    (0..count)
        .map(|index| article(index, &["news"], ArticleStatus::Published))
        .collect()
}

#[derive(Default)]
pub struct FakeArticles {
    articles: Mutex<Vec<ArticleRecord>>,
    find_published_calls: AtomicUsize,
    find_by_id_calls: AtomicUsize,
    view_increments: AtomicUsize,
    fail_reads: AtomicBool,
}

impl FakeArticles {
    pub fn new(articles: Vec<ArticleRecord>) -> Self {
        Self {
            articles: Mutex::new(articles),
            ..Default::default()
        }
    }

    pub fn find_published_calls(&self) -> usize {
        self.find_published_calls.load(Ordering::SeqCst)
    }

    pub fn find_by_id_calls(&self) -> usize {
        self.find_by_id_calls.load(Ordering::SeqCst)
    }

    pub fn view_increments(&self) -> usize {
        self.view_increments.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub async fn view_count(&self, id: Uuid) -> Option<i64> {
        self.articles
            .lock()
            .await
            .iter()
            .find(|article| article.id == id)
            .map(|article| article.view_count)
    }

    fn check_reads(&self) -> Result<(), RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

fn matches_filters(article: &ArticleRecord, filters: &ArticleFilters) -> bool {
    if let Some(tag) = filters.tag() {
        if !article.has_tag(tag) {
            return false;
        }
    }
    if let Some(author) = filters.author() {
        if article.author.id.to_string() != author {
            return false;
        }
    }
    if let Some(search) = filters.search() {
        let needle = search.to_lowercase();
        let haystacks = [&article.title, &article.excerpt, &article.body];
        if !haystacks
            .iter()
            .any(|text| text.to_lowercase().contains(&needle))
        {
            return false;
        }
    }
    true
}

fn compare(a: &ArticleRecord, b: &ArticleRecord, sort: SortSpec) -> CmpOrdering {
    let ordering = match sort.field {
        SortField::PublishedAt => a.published_at.cmp(&b.published_at),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::ViewCount => a.view_count.cmp(&b.view_count),
        SortField::Title => a.title.cmp(&b.title),
    };
    let ordering = ordering.then_with(|| a.id.cmp(&b.id));
    match sort.order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl ArticlesRepo for FakeArticles {
    async fn find_published(
        &self,
        filters: &ArticleFilters,
        sort: SortSpec,
        page: PageRequest,
    ) -> Result<RepoPage<ArticleRecord>, RepoError> {
        self.find_published_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let articles = self.articles.lock().await;
        let mut matching: Vec<ArticleRecord> = articles
            .iter()
            .filter(|article| article.is_published() && matches_filters(article, filters))
            .cloned()
            .collect();
        matching.sort_by(|a, b| compare(a, b, sort));

        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(RepoPage::new(data, total, page))
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        _options: FindOptions,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        self.find_by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        Ok(self
            .articles
            .lock()
            .await
            .iter()
            .find(|article| article.id == id)
            .cloned())
    }

    async fn increment_view_count(&self, id: Uuid) -> Result<(), RepoError> {
        self.view_increments.fetch_add(1, Ordering::SeqCst);
        let mut articles = self.articles.lock().await;
        let article = articles
            .iter_mut()
            .find(|article| article.id == id)
            .ok_or(RepoError::NotFound)?;
        article.view_count += 1;
        Ok(())
    }
}

#[async_trait]
impl ArticlesWriteRepo for FakeArticles {
    async fn create_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut articles = self.articles.lock().await;
        if articles.iter().any(|article| article.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "articles_slug_key".to_string(),
            });
        }
        let record = ArticleRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
            excerpt: params.excerpt,
            body: params.body,
            status: params.status,
            tags: params.tags,
            author: AuthorRef {
                id: params.author_id,
                display_name: None,
            },
            published_at: params.published_at,
            view_count: 0,
            created_at: BASE_TIME,
            updated_at: BASE_TIME,
        };
        articles.push(record.clone());
        Ok(record)
    }

    async fn update_article(
        &self,
        params: UpdateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut articles = self.articles.lock().await;
        let article = articles
            .iter_mut()
            .find(|article| article.id == params.id)
            .ok_or(RepoError::NotFound)?;
        article.slug = params.slug;
        article.title = params.title;
        article.excerpt = params.excerpt;
        article.body = params.body;
        article.tags = params.tags;
        Ok(article.clone())
    }

    async fn update_article_status(
        &self,
        params: UpdateArticleStatusParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut articles = self.articles.lock().await;
        let article = articles
            .iter_mut()
            .find(|article| article.id == params.id)
            .ok_or(RepoError::NotFound)?;
        article.status = params.status;
        if params.status.is_published() && article.published_at.is_none() {
            article.published_at = params.published_at;
        }
        Ok(article.clone())
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), RepoError> {
        let mut articles = self.articles.lock().await;
        let before = articles.len();
        articles.retain(|article| article.id != id);
        if articles.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for FakeArticles {
    async fn health_check(&self) -> Result<(), RepoError> {
        self.check_reads()
    }
}

/// Store whose every operation fails, counting the attempts.
#[derive(Default)]
pub struct FailingStore {
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheStoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Err(CacheStoreError::unavailable("connection refused"))
    }

    async fn set_ex(
        &self,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        Err(CacheStoreError::unavailable("connection refused"))
    }

    async fn del(&self, _keys: &[String]) -> Result<usize, CacheStoreError> {
        Err(CacheStoreError::unavailable("connection refused"))
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, CacheStoreError> {
        Err(CacheStoreError::unavailable("connection refused"))
    }
}

pub struct Harness {
    pub repo: Arc<FakeArticles>,
    pub store: Arc<MemoryCacheStore>,
    pub articles: Arc<ArticleService>,
    pub commands: Arc<ArticleCommands>,
}

impl Harness {
    pub fn new(catalog: Vec<ArticleRecord>) -> Self {
        Self::with_mode(catalog, InvalidationMode::PrefixScan)
    }

    pub fn with_mode(catalog: Vec<ArticleRecord>, mode: InvalidationMode) -> Self {
        let config = CacheConfig {
            invalidation: mode,
            ..Default::default()
        };
        let repo = Arc::new(FakeArticles::new(catalog));
        let store = Arc::new(MemoryCacheStore::new());
        let client = CacheClient::new(store.clone(), config.ttls);
        let articles = Arc::new(ArticleService::new(repo.clone(), client, &config));
        let commands = Arc::new(ArticleCommands::new(repo.clone(), articles.clone()));
        Self {
            repo,
            store,
            articles,
            commands,
        }
    }

    pub async fn cached(&self, key: &str) -> Option<String> {
        self.store.get(key).await.expect("memory store never fails")
    }
}

/// Yield until the background view-count task has run `expected` times.
pub async fn wait_for_view_increments(repo: &FakeArticles, expected: usize) {
    for _ in 0..100 {
        if repo.view_increments() >= expected {
            return;
        }
        tokio::task::yield_now().await;
    }
}

/// Give detached tasks a chance to run.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
