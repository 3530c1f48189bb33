//! API server implementation.

use axum::{middleware, routing::get, Json, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;

use crate::dto::{DatabaseHealth, HealthResponse, KnowledgeResponse, StatusResponse};
use crate::error::ErrorResponse;
use crate::middleware::{cors_layer, no_sniff, request_id, request_logging};
use crate::routes;
use crate::routes::images::{MessageResponse, PromoteRequest, PromoteResponse, UploadResponse};
use crate::routes::knowledge::{
    BatchEditRequest, BatchEditResponse, BatchFailureResponse, SearchRequest,
};
use crate::state::AppState;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_openapi: bool,
    /// Shutdown timeout for graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8085)),
            request_timeout: Duration::from_secs(30),
            enable_openapi: true,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::health::readiness_check,
        crate::routes::health::liveness_check,
        crate::routes::metrics::prometheus_metrics,
        crate::routes::knowledge::create_knowledge,
        crate::routes::knowledge::update_knowledge,
        crate::routes::knowledge::delete_knowledge,
        crate::routes::knowledge::search_by_type,
        crate::routes::knowledge::search_by_tactics_id,
        crate::routes::knowledge::search_by_techniques_id,
        crate::routes::knowledge::search_by_sub_techniques_id,
        crate::routes::knowledge::search,
        crate::routes::knowledge::search_with_body,
        crate::routes::knowledge::search_by_title,
        crate::routes::knowledge::search_by_tags_with_type,
        crate::routes::knowledge::search_by_content,
        crate::routes::knowledge::search_by_keyword,
        crate::routes::knowledge::search_by_id,
        crate::routes::knowledge::batch_edit_knowledge_type,
        crate::routes::images::upload_image,
        crate::routes::images::promote_images,
        crate::routes::images::download_image,
        crate::routes::images::delete_image,
    ),
    components(
        schemas(
            HealthResponse,
            DatabaseHealth,
            KnowledgeResponse,
            StatusResponse,
            SearchRequest,
            BatchEditRequest,
            BatchEditResponse,
            BatchFailureResponse,
            UploadResponse,
            PromoteRequest,
            PromoteResponse,
            MessageResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Knowledge", description = "Knowledge records and searches"),
        (name = "Images", description = "Image storage"),
        (name = "Metrics", description = "Prometheus metrics"),
    ),
    info(
        title = "Knowledge Warden API",
        version = "0.1.0",
        description = "Security knowledge base: ATT&CK-tagged records, search and image storage",
        license(name = "MIT"),
    )
)]
pub struct ApiDoc;

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Creates a new API server.
    pub fn new(state: AppState, config: ApiServerConfig) -> Self {
        Self { config, state }
    }

    /// Creates a new API server with default configuration.
    pub fn with_state(state: AppState) -> Self {
        Self::new(state, ApiServerConfig::default())
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        routes::health::init_start_time();
        if self.state.prometheus_handle.is_some() {
            routes::metrics::register_metrics();
        }

        let mut app = routes::create_router(self.state.clone());

        if self.config.enable_openapi {
            app = app.route(
                "/api-docs/openapi.json",
                get(|| async { Json(ApiDoc::openapi()) }),
            );
        }

        // Innermost first
        app.layer(middleware::from_fn(no_sniff))
            .layer(middleware::from_fn(request_logging))
            .layer(middleware::from_fn(request_id))
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(cors_layer())
            .layer(CatchPanicLayer::new())
    }

    /// Runs the server until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), std::io::Error> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs the server with a custom shutdown signal.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let addr = self.config.bind_address;

        info!("Starting API server on {}", addr);

        let listener = TcpListener::bind(addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.state.db.close().await;
        info!("API server shut down gracefully");
        Ok(())
    }
}

/// Default shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_serves_openapi() {
        let (state, _dir) = create_test_state().await;
        let router = ApiServer::with_state(state).router();

        let response = router
            .oneshot(
                Request::get("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/api/knowledge/batchEdit"].is_object());
    }

    #[tokio::test]
    async fn test_openapi_can_be_disabled() {
        let (state, _dir) = create_test_state().await;
        let config = ApiServerConfig {
            enable_openapi: false,
            ..ApiServerConfig::default()
        };
        let router = ApiServer::new(state, config).router();

        let response = router
            .oneshot(
                Request::get("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_default_config() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address.port(), 8085);
        assert!(config.enable_openapi);
    }
}
