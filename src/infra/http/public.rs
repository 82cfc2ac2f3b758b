use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::application::articles::{ArticleFilters, ArticleService, FilterField, SortSpec};
use crate::application::error::AppError;
use crate::application::pagination::PageRequest;
use crate::application::repos::HealthRepo;

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    parse_article_id,
};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;

#[derive(Clone)]
pub struct HttpState {
    pub articles: Arc<ArticleService>,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/articles", get(list_articles))
        .route("/api/articles/homepage", get(homepage))
        .route("/api/articles/{id}", get(article_detail))
        .route("/_health/db", get(public_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Raw listing parameters; numbers stay strings until validated so bad input
/// maps to a reported 400.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListingQuery {
    page: Option<String>,
    limit: Option<String>,
    tag: Option<String>,
    author: Option<String>,
    search: Option<String>,
    sort_by: Option<String>,
    sort_order: Option<String>,
}

impl ListingQuery {
    fn page_request(&self) -> Result<PageRequest, AppError> {
        let page = parse_number("page", self.page.as_deref(), DEFAULT_PAGE)?;
        let limit = parse_number("limit", self.limit.as_deref(), DEFAULT_LIMIT)?;
        Ok(PageRequest::new(page, limit)?)
    }

    fn sort(&self) -> Result<SortSpec, AppError> {
        Ok(SortSpec::parse(
            self.sort_by.as_deref(),
            self.sort_order.as_deref(),
        )?)
    }

    fn filters(&self) -> ArticleFilters {
        [
            (FilterField::Tag, self.tag.as_deref()),
            (FilterField::Author, self.author.as_deref()),
            (FilterField::Search, self.search.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|value| (field, value)))
        .collect()
    }
}

fn parse_number(name: &str, raw: Option<&str>, default: u32) -> Result<u32, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| AppError::validation(format!("{name} must be a positive integer"))),
    }
}

async fn list_articles(
    State(state): State<HttpState>,
    Query(query): Query<ListingQuery>,
) -> Result<Response, AppError> {
    let page = query.page_request()?;
    let sort = query.sort()?;
    let filters = query.filters();

    let result = state.articles.fetch_published(page, &filters, sort).await?;
    Ok(Json(result).into_response())
}

async fn homepage(State(state): State<HttpState>) -> Result<Response, AppError> {
    let articles = state.articles.fetch_homepage().await?;
    Ok(Json(articles).into_response())
}

async fn article_detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_article_id(&id)?;
    match state.articles.get_by_id(id).await? {
        Some(article) if article.is_published() => Ok(Json(article).into_response()),
        _ => Err(AppError::NotFound),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::articles::{SortField, SortOrder};

    fn query(pairs: &[(&str, &str)]) -> ListingQuery {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        Query::<ListingQuery>::try_from_uri(
            &format!("/api/articles?{encoded}").parse().expect("uri"),
        )
        .expect("query")
        .0
    }

    #[test]
    fn defaults_apply_when_parameters_are_absent() {
        let parsed = query(&[]);
        let page = parsed.page_request().expect("page");
        assert_eq!((page.page(), page.limit()), (1, 10));
        assert!(parsed.sort().expect("sort").is_default());
        assert!(parsed.filters().is_empty());
    }

    #[test]
    fn camel_case_parameters_are_recognized() {
        let parsed = query(&[
            ("page", "2"),
            ("limit", "5"),
            ("tag", "match-report"),
            ("sortBy", "viewCount"),
            ("sortOrder", "asc"),
        ]);
        let sort = parsed.sort().expect("sort");
        assert_eq!(sort.field, SortField::ViewCount);
        assert_eq!(sort.order, SortOrder::Asc);
        assert_eq!(parsed.filters().tag(), Some("match-report"));
        assert_eq!(parsed.page_request().expect("page").page(), 2);
    }

    #[test]
    fn non_numeric_page_is_rejected() {
        let err = query(&[("page", "two")])
            .page_request()
            .expect_err("invalid page");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn out_of_range_limit_is_rejected() {
        let err = query(&[("limit", "1000")])
            .page_request()
            .expect_err("invalid limit");
        assert!(matches!(err, AppError::Pagination(_)));
    }
}
