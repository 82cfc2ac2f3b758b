use async_trait::async_trait;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::application::articles::{ArticleFilters, SortSpec};
use crate::application::pagination::{PageRequest, RepoPage};
use crate::application::repos::{
    ArticlesRepo, ArticlesWriteRepo, CreateArticleParams, FindOptions, RepoError,
    UpdateArticleParams, UpdateArticleStatusParams,
};
use crate::domain::entities::ArticleRecord;

use super::types::ArticleRow;
use super::{ARTICLE_COLUMNS, PostgresRepositories, map_sqlx_error};

impl PostgresRepositories {
    async fn count_published(&self, filters: &ArticleFilters) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM articles a WHERE 1=1 ");
        Self::apply_published_scope(&mut qb);
        Self::apply_filters(&mut qb, filters);

        let total = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(u64::try_from(total).unwrap_or(0))
    }
}

/// Wrap a mutating statement over `articles` so the affected row comes back
/// joined with its author.
fn returning_article(statement: &str) -> String {
    format!(
        "WITH changed AS ({statement} RETURNING *) \
         SELECT {ARTICLE_COLUMNS} FROM changed a \
         LEFT JOIN authors au ON au.id = a.author_id"
    )
}

#[async_trait]
impl ArticlesRepo for PostgresRepositories {
    async fn find_published(
        &self,
        filters: &ArticleFilters,
        sort: SortSpec,
        page: PageRequest,
    ) -> Result<RepoPage<ArticleRecord>, RepoError> {
        let total = self.count_published(filters).await?;

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(ARTICLE_COLUMNS);
        qb.push(" FROM articles a LEFT JOIN authors au ON au.id = a.author_id WHERE 1=1 ");
        Self::apply_published_scope(&mut qb);
        Self::apply_filters(&mut qb, filters);
        Self::push_order_by(&mut qb, sort);
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

        let rows = qb
            .build_query_as::<ArticleRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let data = rows.into_iter().map(ArticleRecord::from).collect();
        Ok(RepoPage::new(data, total, page))
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        options: FindOptions,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        let sql = if options.include_author {
            format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles a \
                 LEFT JOIN authors au ON au.id = a.author_id WHERE a.id = $1"
            )
        } else {
            "SELECT a.id, a.slug, a.title, a.excerpt, a.body, a.status, a.tags, a.author_id, \
             NULL::text AS author_name, a.published_at, a.view_count, a.created_at, a.updated_at \
             FROM articles a WHERE a.id = $1"
                .to_string()
        };

        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ArticleRecord::from))
    }

    async fn increment_view_count(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE articles SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ArticlesWriteRepo for PostgresRepositories {
    async fn create_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let sql = returning_article(
            "INSERT INTO articles \
             (id, slug, title, excerpt, body, status, tags, author_id, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.slug)
            .bind(params.title)
            .bind(params.excerpt)
            .bind(params.body)
            .bind(params.status)
            .bind(params.tags)
            .bind(params.author_id)
            .bind(params.published_at)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_article(
        &self,
        params: UpdateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let sql = returning_article(
            "UPDATE articles SET slug = $2, title = $3, excerpt = $4, body = $5, tags = $6, \
             updated_at = now() WHERE id = $1",
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(params.id)
            .bind(params.slug)
            .bind(params.title)
            .bind(params.excerpt)
            .bind(params.body)
            .bind(params.tags)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(ArticleRecord::from).ok_or(RepoError::NotFound)
    }

    async fn update_article_status(
        &self,
        params: UpdateArticleStatusParams,
    ) -> Result<ArticleRecord, RepoError> {
        let sql = returning_article(
            "UPDATE articles SET status = $2, \
             published_at = CASE WHEN $2 = 'published'::article_status \
                 THEN COALESCE(published_at, $3) ELSE published_at END, \
             updated_at = now() WHERE id = $1",
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(params.id)
            .bind(params.status)
            .bind(params.published_at)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(ArticleRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
