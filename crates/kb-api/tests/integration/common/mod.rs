//! Common test utilities for integration tests.

use axum::{
    body::Body,
    http::{Method, StatusCode},
    Router,
};
use kb_api::{routes, state::AppState};
use kb_core::db::{create_pool_with_options, run_migrations, DbPool, PoolOptions};
use kb_core::ImageStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// Public base URL the test image store hands out.
pub const PUBLIC_BASE_URL: &str = "http://kb.test";

/// Creates an in-memory SQLite database with the knowledge schema applied.
pub async fn setup_test_db() -> DbPool {
    let db_url = format!(
        "sqlite:file:integration_test_{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    let options = PoolOptions {
        max_connections: 1,
        min_connections: 1,
        ..PoolOptions::default()
    };

    let pool = create_pool_with_options(&db_url, options)
        .await
        .expect("Failed to create SQLite pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Test router plus the state behind it. Keep the `TempDir` alive for the
/// whole test; it holds the image folder.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub images: TempDir,
}

pub async fn create_test_app() -> TestApp {
    let pool = setup_test_db().await;
    let images = TempDir::new().expect("Failed to create image dir");
    let state = AppState::new(pool, ImageStore::new(images.path(), PUBLIC_BASE_URL));
    let router = routes::create_router(state.clone());
    TestApp {
        router,
        state,
        images,
    }
}

pub fn get_request(uri: &str) -> axum::extract::Request<Body> {
    axum::extract::Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json_request(uri: &str, body: &Value) -> axum::extract::Request<Body> {
    json_request(Method::POST, uri, body)
}

pub fn put_json_request(uri: &str, body: &Value) -> axum::extract::Request<Body> {
    json_request(Method::PUT, uri, body)
}

fn json_request(method: Method, uri: &str, body: &Value) -> axum::extract::Request<Body> {
    axum::extract::Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn delete_request(uri: &str) -> axum::extract::Request<Body> {
    axum::extract::Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Sends request and parses JSON response.
pub async fn send_request<T: DeserializeOwned>(
    app: Router,
    request: axum::extract::Request<Body>,
) -> (StatusCode, T) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: T = serde_json::from_slice(&body).unwrap_or_else(|e| {
        panic!(
            "Failed to parse response: {} - Body: {:?}",
            e,
            String::from_utf8_lossy(&body)
        )
    });
    (status, parsed)
}

/// Sends request and returns the raw response body.
pub async fn send_request_raw(
    app: Router,
    request: axum::extract::Request<Body>,
) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

/// Creates a record through the API and returns its id.
pub async fn create_record(app: &Router, body: Value) -> String {
    let (status, created): (StatusCode, Value) =
        send_request(app.clone(), post_json_request("/api/knowledge", &body)).await;
    assert_eq!(status, StatusCode::OK, "create failed: {}", created);
    created["id"].as_str().expect("id in response").to_string()
}

/// Ids of a search response, in result order.
pub fn ids(results: &Value) -> Vec<String> {
    results
        .as_array()
        .expect("array response")
        .iter()
        .map(|r| r["id"].as_str().unwrap_or_default().to_string())
        .collect()
}
