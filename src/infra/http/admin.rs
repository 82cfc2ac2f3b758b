use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::info;
use uuid::Uuid;

use crate::application::articles::{
    ArticleCommands, ArticleService, CreateArticleInput, UpdateArticleInput, WarmSummary,
};
use crate::application::error::AppError;
use crate::application::repos::HealthRepo;

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    parse_article_id,
};

const SOURCE: &str = "touchline::http::admin";

#[derive(Clone)]
pub struct AdminState {
    pub commands: Arc<ArticleCommands>,
    pub articles: Arc<ArticleService>,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/api/admin/articles", post(create_article))
        .route(
            "/api/admin/articles/{id}",
            put(update_article).delete(delete_article),
        )
        .route("/api/admin/articles/{id}/publish", post(publish_article))
        .route("/api/admin/articles/{id}/unpublish", post(unpublish_article))
        .route("/api/admin/cache/invalidate", post(invalidate_cache))
        .route("/api/admin/cache/warm", post(warm_cache))
        .route("/_health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Decode a JSON request body so malformed input is reported like any other
/// validation failure.
fn decode_body<T: DeserializeOwned>(what: &str, body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|err| AppError::validation(format!("invalid {what} request: {err}")))
}

async fn create_article(
    State(state): State<AdminState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let input: CreateArticleInput = decode_body("create article", &body)?;
    let article = state.commands.create(input).await?;
    Ok((StatusCode::CREATED, Json(article)).into_response())
}

async fn update_article(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let id = parse_article_id(&id)?;
    let input: UpdateArticleInput = decode_body("update article", &body)?;
    let article = state.commands.update(id, input).await?;
    Ok(Json(article).into_response())
}

async fn publish_article(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_article_id(&id)?;
    let article = state.commands.publish(id).await?;
    Ok(Json(article).into_response())
}

async fn unpublish_article(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_article_id(&id)?;
    let article = state.commands.unpublish(id).await?;
    Ok(Json(article).into_response())
}

async fn delete_article(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_article_id(&id)?;
    state.commands.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Default, Deserialize)]
struct InvalidateRequest {
    #[serde(default)]
    id: Option<Uuid>,
}

/// The body is optional; an empty request flushes listings and the homepage.
async fn invalidate_cache(
    State(state): State<AdminState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        InvalidateRequest::default()
    } else {
        decode_body("invalidate", &body)?
    };

    state.articles.invalidate(request.id).await;
    info!(target = SOURCE, id = ?request.id, "cache invalidated on request");
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WarmResponse {
    listing_pages: u32,
    homepage: bool,
    failures: u32,
}

impl From<WarmSummary> for WarmResponse {
    fn from(summary: WarmSummary) -> Self {
        Self {
            listing_pages: summary.listing_pages,
            homepage: summary.homepage,
            failures: summary.failures,
        }
    }
}

async fn warm_cache(State(state): State<AdminState>) -> Response {
    let summary = state.articles.warm_cache().await;
    Json(WarmResponse::from(summary)).into_response()
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.health.health_check().await)
}
