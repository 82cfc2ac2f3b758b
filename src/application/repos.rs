//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::articles::{ArticleFilters, SortSpec};
use crate::application::pagination::{PageRequest, RepoPage};
use crate::domain::entities::ArticleRecord;
use crate::domain::types::ArticleStatus;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Relations to load alongside an article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub include_author: bool,
}

impl FindOptions {
    pub fn with_author() -> Self {
        Self {
            include_author: true,
        }
    }
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    /// Published articles matching `filters`, ordered by `sort`.
    async fn find_published(
        &self,
        filters: &ArticleFilters,
        sort: SortSpec,
        page: PageRequest,
    ) -> Result<RepoPage<ArticleRecord>, RepoError>;

    /// Any article regardless of status.
    async fn find_by_id(
        &self,
        id: Uuid,
        options: FindOptions,
    ) -> Result<Option<ArticleRecord>, RepoError>;

    async fn increment_view_count(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateArticleParams {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub status: ArticleStatus,
    pub tags: Vec<String>,
    pub author_id: Uuid,
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct UpdateArticleParams {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct UpdateArticleStatusParams {
    pub id: Uuid,
    pub status: ArticleStatus,
    pub published_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait ArticlesWriteRepo: Send + Sync {
    async fn create_article(&self, params: CreateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    async fn update_article(&self, params: UpdateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    /// Moving to `Published` keeps an existing publish time and only falls back
    /// to `params.published_at` when none is recorded.
    async fn update_article_status(
        &self,
        params: UpdateArticleStatusParams,
    ) -> Result<ArticleRecord, RepoError>;

    async fn delete_article(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
