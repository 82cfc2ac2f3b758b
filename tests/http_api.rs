mod support;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use touchline::cache::keys::HOMEPAGE_KEY;
use touchline::infra::http::{AdminState, HttpState, build_admin_router, build_router};

use support::{Harness, sample_catalog, settle};

fn public_router(harness: &Harness) -> Router {
    build_router(HttpState {
        articles: harness.articles.clone(),
        health: harness.repo.clone(),
    })
}

fn admin_router(harness: &Harness) -> Router {
    build_admin_router(AdminState {
        commands: harness.commands.clone(),
        articles: harness.articles.clone(),
        health: harness.repo.clone(),
    })
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    send_raw(router, method, uri, body.map(|value| value.to_string())).await
}

async fn send_raw(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<String>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(raw) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(raw)
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("request should build");
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("json body")
}

#[tokio::test]
async fn listing_returns_camel_case_envelope() {
    let harness = Harness::new(sample_catalog());
    let router = public_router(&harness);

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/articles?tag=academy&limit=2&page=2",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["total"], 5);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["hasNext"], true);
    assert_eq!(body["hasPrev"], true);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert!(body["data"][0]["publishedAt"].is_string());
}

#[tokio::test]
async fn listing_rejects_invalid_parameters() {
    let harness = Harness::new(sample_catalog());
    let router = public_router(&harness);

    for uri in [
        "/api/articles?page=0",
        "/api/articles?page=abc",
        "/api/articles?limit=500",
        "/api/articles?sortBy=colour",
        "/api/articles?sortOrder=sideways",
    ] {
        let (status, _) = send(&router, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    assert_eq!(harness.repo.find_published_calls(), 0);
}

#[tokio::test]
async fn homepage_route_is_not_mistaken_for_an_id() {
    let harness = Harness::new(sample_catalog());
    let router = public_router(&harness);

    let (status, body) = send(&router, Method::GET, "/api/articles/homepage", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn article_detail_handles_found_missing_and_malformed_ids() {
    let harness = Harness::new(sample_catalog());
    let router = public_router(&harness);
    let id = sample_catalog()[0].id;

    let (status, body) = send(&router, Method::GET, &format!("/api/articles/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["id"], id.to_string());

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&router, Method::GET, &format!("/api/articles/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, Method::GET, "/api/articles/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    settle().await;
}

#[tokio::test]
async fn article_detail_hides_drafts_from_readers() {
    let harness = Harness::new(sample_catalog());
    let router = public_router(&harness);
    let draft = sample_catalog()[8].id;

    let (status, body) = send(&router, Method::GET, &format!("/api/articles/{draft}"), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!String::from_utf8_lossy(&body).contains("draft"));
    assert_eq!(harness.cached(&touchline::cache::keys::item_key(draft)).await, None);
    settle().await;
    assert_eq!(harness.repo.view_increments(), 0);
}

#[tokio::test]
async fn repository_failure_surfaces_as_unavailable() {
    let harness = Harness::new(sample_catalog());
    let router = public_router(&harness);
    harness.repo.fail_reads(true);

    let (status, _) = send(&router, Method::GET, "/api/articles", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&router, Method::GET, "/_health/db", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_route_reports_no_content_when_healthy() {
    let harness = Harness::new(sample_catalog());
    let (status, _) = send(&public_router(&harness), Method::GET, "/_health/db", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn creating_a_published_article_refreshes_the_homepage() {
    let harness = Harness::new(sample_catalog());
    let public = public_router(&harness);
    let admin = admin_router(&harness);

    send(&public, Method::GET, "/api/articles/homepage", None).await;
    assert!(harness.cached(HOMEPAGE_KEY).await.is_some());

    let (status, body) = send(
        &admin,
        Method::POST,
        "/api/admin/articles",
        Some(json!({
            "title": "Under-16s lift the county cup",
            "body": "A late winner sealed it.",
            "tags": ["Academy"],
            "authorId": support::author_id(),
            "publish": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json_body(&body);
    assert_eq!(created["slug"], "under-16s-lift-the-county-cup");
    assert_eq!(created["tags"], json!(["academy"]));
    assert!(harness.cached(HOMEPAGE_KEY).await.is_none());

    let (_, body) = send(&public, Method::GET, "/api/articles/homepage", None).await;
    assert_eq!(json_body(&body)[0]["id"], created["id"]);
}

#[tokio::test]
async fn create_rejects_blank_titles() {
    let harness = Harness::new(sample_catalog());
    let (status, _) = send(
        &admin_router(&harness),
        Method::POST,
        "/api/admin/articles",
        Some(json!({
            "title": "   ",
            "body": "Body",
            "authorId": support::author_id()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_admin_bodies_are_bad_requests() {
    let harness = Harness::new(sample_catalog());
    let admin = admin_router(&harness);
    let id = sample_catalog()[0].id;

    for (method, uri, raw) in [
        (Method::POST, "/api/admin/articles".to_string(), "{\"title\": "),
        (Method::POST, "/api/admin/articles".to_string(), "{\"title\": 7}"),
        (Method::PUT, format!("/api/admin/articles/{id}"), "not json"),
        (Method::POST, "/api/admin/cache/invalidate".to_string(), "[1,"),
    ] {
        let (status, body) = send_raw(&admin, method, &uri, Some(raw.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {raw}");
        assert_eq!(body, b"Request could not be processed", "{uri} {raw}");
    }
    assert_eq!(harness.repo.find_published_calls(), 0);
}

#[tokio::test]
async fn duplicate_slug_is_a_conflict() {
    let harness = Harness::new(sample_catalog());
    let (status, _) = send(
        &admin_router(&harness),
        Method::POST,
        "/api/admin/articles",
        Some(json!({
            "title": "Anything",
            "slug": "article-1",
            "body": "Body",
            "authorId": support::author_id()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unpublishing_hides_the_article_from_listings() {
    let harness = Harness::new(sample_catalog());
    let public = public_router(&harness);
    let admin = admin_router(&harness);
    let target = sample_catalog()[0].id;

    let (_, body) = send(&public, Method::GET, "/api/articles?tag=academy", None).await;
    assert_eq!(json_body(&body)["total"], 5);

    let (status, body) = send(
        &admin,
        Method::POST,
        &format!("/api/admin/articles/{target}/unpublish"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "draft");

    let (_, body) = send(&public, Method::GET, "/api/articles?tag=academy", None).await;
    assert_eq!(json_body(&body)["total"], 4);
}

#[tokio::test]
async fn admin_writes_on_unknown_articles_are_not_found() {
    let harness = Harness::new(sample_catalog());
    let admin = admin_router(&harness);
    let missing = uuid::Uuid::new_v4();

    let (status, _) = send(
        &admin,
        Method::POST,
        &format!("/api/admin/articles/{missing}/publish"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &admin,
        Method::DELETE,
        &format!("/api/admin/articles/{missing}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalidate_endpoint_accepts_empty_and_targeted_requests() {
    let harness = Harness::new(sample_catalog());
    let public = public_router(&harness);
    let admin = admin_router(&harness);

    send(&public, Method::GET, "/api/articles", None).await;
    let (status, _) = send(&admin, Method::POST, "/api/admin/cache/invalidate", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    send(&public, Method::GET, "/api/articles", None).await;
    assert_eq!(harness.repo.find_published_calls(), 2);

    let id = sample_catalog()[0].id;
    let (status, _) = send(
        &admin,
        Method::POST,
        "/api/admin/cache/invalidate",
        Some(json!({ "id": id })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &admin,
        Method::POST,
        "/api/admin/cache/invalidate",
        Some(json!({ "id": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn warm_endpoint_reports_summary() {
    let harness = Harness::new(sample_catalog());
    let (status, body) = send(
        &admin_router(&harness),
        Method::POST,
        "/api/admin/cache/warm",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["listingPages"], 1);
    assert_eq!(body["homepage"], true);
    assert_eq!(body["failures"], 0);
}
