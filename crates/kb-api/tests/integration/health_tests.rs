//! Health, readiness and liveness endpoint tests.

use axum::http::StatusCode;
use serde_json::Value;

use super::common::{create_test_app, get_request, send_request};

#[tokio::test]
async fn test_health_reports_database() {
    let app = create_test_app().await;

    let (status, body): (StatusCode, Value) =
        send_request(app.router, get_request("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["connected"], true);
    assert_eq!(body["database"]["db_type"], "sqlite");
}

#[tokio::test]
async fn test_probes_return_ok() {
    let app = create_test_app().await;

    for uri in ["/ready", "/live"] {
        let response = tower::ServiceExt::oneshot(app.router.clone(), get_request(uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn test_metrics_without_recorder_is_unavailable() {
    let app = create_test_app().await;

    let response = tower::ServiceExt::oneshot(app.router, get_request("/metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
