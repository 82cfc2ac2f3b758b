//! Article write path. Every successful write invalidates the read caches.

use std::sync::Arc;

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{
    ArticlesWriteRepo, CreateArticleParams, RepoError, UpdateArticleParams,
    UpdateArticleStatusParams,
};
use crate::domain::entities::ArticleRecord;
use crate::domain::slug::{derive_slug, normalize_tags};
use crate::domain::types::ArticleStatus;

use super::service::ArticleService;

const SOURCE: &str = "touchline::articles::commands";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author_id: Uuid,
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticleInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub struct ArticleCommands {
    repo: Arc<dyn ArticlesWriteRepo>,
    articles: Arc<ArticleService>,
}

impl ArticleCommands {
    pub fn new(repo: Arc<dyn ArticlesWriteRepo>, articles: Arc<ArticleService>) -> Self {
        Self { repo, articles }
    }

    pub async fn create(&self, input: CreateArticleInput) -> Result<ArticleRecord, AppError> {
        let title = required_title(&input.title)?;
        let slug = resolve_slug(input.slug.as_deref(), &title)?;
        let (status, published_at) = if input.publish {
            (ArticleStatus::Published, Some(OffsetDateTime::now_utc()))
        } else {
            (ArticleStatus::Draft, None)
        };

        let article = self
            .repo
            .create_article(CreateArticleParams {
                slug,
                title,
                excerpt: input.excerpt.trim().to_string(),
                body: input.body,
                status,
                tags: normalize_tags(&input.tags),
                author_id: input.author_id,
                published_at,
            })
            .await?;

        self.articles.invalidate(Some(article.id)).await;
        info!(
            target = SOURCE,
            id = %article.id,
            slug = %article.slug,
            status = article.status.as_str(),
            "article created"
        );
        Ok(article)
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateArticleInput,
    ) -> Result<ArticleRecord, AppError> {
        let title = required_title(&input.title)?;
        let slug = resolve_slug(input.slug.as_deref(), &title)?;

        let article = self
            .repo
            .update_article(UpdateArticleParams {
                id,
                slug,
                title,
                excerpt: input.excerpt.trim().to_string(),
                body: input.body,
                tags: normalize_tags(&input.tags),
            })
            .await
            .map_err(not_found)?;

        self.articles.invalidate(Some(id)).await;
        info!(target = SOURCE, id = %id, "article updated");
        Ok(article)
    }

    pub async fn publish(&self, id: Uuid) -> Result<ArticleRecord, AppError> {
        self.set_status(id, ArticleStatus::Published).await
    }

    pub async fn unpublish(&self, id: Uuid) -> Result<ArticleRecord, AppError> {
        self.set_status(id, ArticleStatus::Draft).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.repo.delete_article(id).await.map_err(not_found)?;
        self.articles.invalidate(Some(id)).await;
        info!(target = SOURCE, id = %id, "article deleted");
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ArticleStatus) -> Result<ArticleRecord, AppError> {
        let published_at = status
            .is_published()
            .then(OffsetDateTime::now_utc);

        let article = self
            .repo
            .update_article_status(UpdateArticleStatusParams {
                id,
                status,
                published_at,
            })
            .await
            .map_err(not_found)?;

        self.articles.invalidate(Some(id)).await;
        info!(
            target = SOURCE,
            id = %id,
            status = status.as_str(),
            "article status changed"
        );
        Ok(article)
    }
}

fn required_title(title: &str) -> Result<String, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn resolve_slug(explicit: Option<&str>, title: &str) -> Result<String, AppError> {
    let source = explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(title);
    derive_slug(source).map_err(|err| AppError::validation(err.to_string()))
}

fn not_found(err: RepoError) -> AppError {
    match err {
        RepoError::NotFound => AppError::NotFound,
        other => AppError::from(other),
    }
}
