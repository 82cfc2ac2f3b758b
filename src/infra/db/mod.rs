//! Postgres-backed repository implementations.

mod articles;
mod types;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::articles::{ArticleFilters, SortField, SortOrder, SortSpec};
use crate::application::repos::{HealthRepo, RepoError};
use crate::domain::types::ArticleStatus;

/// Column list shared by every article read; expects `a` = articles and
/// `au` = authors.
const ARTICLE_COLUMNS: &str = "a.id, a.slug, a.title, a.excerpt, a.body, a.status, a.tags, \
     a.author_id, au.display_name AS author_name, a.published_at, a.view_count, \
     a.created_at, a.updated_at";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    /// Pool that defers connecting until the first query.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    fn apply_published_scope(qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" AND a.status = ");
        qb.push_bind(ArticleStatus::Published);
        qb.push(" AND a.published_at IS NOT NULL ");
    }

    fn apply_filters<'q>(qb: &mut QueryBuilder<'q, Postgres>, filters: &'q ArticleFilters) {
        if let Some(tag) = filters.tag() {
            qb.push(" AND ");
            qb.push_bind(tag);
            qb.push(" = ANY(a.tags) ");
        }

        if let Some(author) = filters.author() {
            qb.push(" AND a.author_id::text = ");
            qb.push_bind(author);
            qb.push(" ");
        }

        if let Some(search) = filters.search() {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (a.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR a.excerpt ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR a.body ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
    }

    fn push_order_by(qb: &mut QueryBuilder<'_, Postgres>, sort: SortSpec) {
        let column = match sort.field {
            SortField::PublishedAt => "a.published_at",
            SortField::CreatedAt => "a.created_at",
            SortField::ViewCount => "a.view_count",
            SortField::Title => "a.title",
        };
        let direction = match sort.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format_args!(
            " ORDER BY {column} {direction} NULLS LAST, a.id {direction} "
        ));
    }
}

/// Escape `LIKE` metacharacters so search input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
