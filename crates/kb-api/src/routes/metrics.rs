//! Metrics endpoint and recording helpers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics::{counter, describe_counter, describe_histogram};

use crate::state::AppState;

/// Creates metrics routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(prometheus_metrics))
}

/// Prometheus metrics endpoint.
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain"),
        (status = 503, description = "Metrics recorder not installed")
    ),
    tag = "Metrics"
)]
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus_handle {
        Some(handle) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Prometheus metrics not initialized".to_string(),
        ),
    }
}

/// Registers metric descriptions. Call once during server start.
pub fn register_metrics() {
    describe_counter!(
        "knowledge_searches_total",
        "Knowledge searches served, by operation"
    );
    describe_counter!(
        "knowledge_mutations_total",
        "Knowledge records created, updated or deleted"
    );
    describe_counter!(
        "knowledge_batch_edit_failures_total",
        "Per-id failures in batch knowledge type edits"
    );
    describe_counter!(
        "knowledge_http_requests_total",
        "HTTP requests handled, by method and status"
    );
    describe_histogram!(
        "knowledge_http_request_duration_seconds",
        "HTTP request latency in seconds"
    );
}

/// Records one search of the given operation.
pub fn record_search(operation: &'static str, results: usize) {
    counter!("knowledge_searches_total", "operation" => operation).increment(1);
    tracing::debug!(operation, results, "Knowledge search served");
}

/// Records a create, update or delete.
pub fn record_mutation(operation: &'static str) {
    counter!("knowledge_mutations_total", "operation" => operation).increment(1);
}

pub fn record_batch_failures(count: usize) {
    counter!("knowledge_batch_edit_failures_total").increment(count as u64);
}
