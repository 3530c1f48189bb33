//! Application state shared across handlers.

use kb_core::db::{create_knowledge_repository, DbPool};
use kb_core::{ImageStore, KnowledgeService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DbPool>,
    /// Knowledge operations backed by the pool.
    pub knowledge: Arc<KnowledgeService>,
    /// Image storage.
    pub images: Arc<ImageStore>,
    /// Prometheus metrics handle for rendering metrics.
    pub prometheus_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(db: DbPool, images: ImageStore) -> Self {
        let repo = create_knowledge_repository(&db);
        Self {
            knowledge: Arc::new(KnowledgeService::new(Arc::from(repo))),
            db: Arc::new(db),
            images: Arc::new(images),
            prometheus_handle: None,
        }
    }

    /// Creates a new application state with Prometheus handle.
    pub fn with_prometheus_handle(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(Arc::new(handle));
        self
    }
}
