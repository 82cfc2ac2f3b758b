use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{ArticleRecord, AuthorRef};
use crate::domain::types::ArticleStatus;

#[derive(sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub(crate) id: Uuid,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) excerpt: String,
    pub(crate) body: String,
    pub(crate) status: ArticleStatus,
    pub(crate) tags: Vec<String>,
    pub(crate) author_id: Uuid,
    pub(crate) author_name: Option<String>,
    pub(crate) published_at: Option<OffsetDateTime>,
    pub(crate) view_count: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            excerpt: row.excerpt,
            body: row.body,
            status: row.status,
            tags: row.tags,
            author: AuthorRef {
                id: row.author_id,
                display_name: row.author_name,
            },
            published_at: row.published_at,
            view_count: row.view_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
