use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const TARGET: &str = "touchline::http::response";

/// Part of the article surface a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    Homepage,
    Listing,
    Item,
    AdminArticle,
    AdminCache,
    Health,
    Other,
}

impl RouteScope {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteScope::Homepage => "homepage",
            RouteScope::Listing => "listing",
            RouteScope::Item => "item",
            RouteScope::AdminArticle => "admin_article",
            RouteScope::AdminCache => "admin_cache",
            RouteScope::Health => "health",
            RouteScope::Other => "other",
        }
    }

    fn is_admin(self) -> bool {
        matches!(self, RouteScope::AdminArticle | RouteScope::AdminCache)
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub scope: RouteScope,
    /// Set when the path names an article, even if it does not exist.
    pub article_id: Option<Uuid>,
}

impl RequestContext {
    pub fn for_path(path: &str) -> Self {
        let (scope, article_id) = classify(path);
        Self {
            request_id: Uuid::new_v4(),
            scope,
            article_id,
        }
    }
}

fn classify(path: &str) -> (RouteScope, Option<Uuid>) {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["api", "articles"] => (RouteScope::Listing, None),
        ["api", "articles", "homepage"] => (RouteScope::Homepage, None),
        ["api", "articles", id] => (RouteScope::Item, Uuid::parse_str(id).ok()),
        ["api", "admin", "articles", rest @ ..] => (
            RouteScope::AdminArticle,
            rest.first().and_then(|id| Uuid::parse_str(id).ok()),
        ),
        ["api", "admin", "cache", ..] => (RouteScope::AdminCache, None),
        ["_health", ..] => (RouteScope::Health, None),
        _ => (RouteScope::Other, None),
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::for_path(request.uri().path());
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Logs failed requests with their diagnostic, and completed admin mutations.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::for_path(request.uri().path()));
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let scope = ctx.scope.as_str();
    let article_id = ctx.article_id.map(|id| id.to_string());
    let request_id = ctx.request_id.to_string();

    if response.status().is_success() {
        if ctx.scope.is_admin() && method != Method::GET {
            info!(
                target: TARGET,
                status,
                method = %method,
                scope,
                article_id = article_id.as_deref(),
                elapsed_ms,
                request_id = %request_id,
                "admin request applied"
            );
        }
        return response;
    }

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        warn!(
            target: TARGET,
            status,
            method = %method,
            scope,
            article_id = article_id.as_deref(),
            request_id = %request_id,
            "request rejected before reaching a handler"
        );
        return response;
    };

    if response.status().is_server_error() {
        error!(
            target: TARGET,
            status,
            method = %method,
            scope,
            article_id = article_id.as_deref(),
            elapsed_ms,
            source = report.source,
            chain = ?report.messages,
            request_id = %request_id,
            "request failed"
        );
    } else {
        warn!(
            target: TARGET,
            status,
            method = %method,
            scope,
            article_id = article_id.as_deref(),
            detail = report.messages.first().map(String::as_str),
            request_id = %request_id,
            "request refused"
        );
    }

    response
}
