//! API routes.

pub mod health;
pub mod images;
pub mod knowledge;
pub mod metrics;

use crate::state::AppState;
use axum::Router;

/// Creates the main API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .nest("/api", api_routes())
        .merge(health::routes())
        .merge(metrics::routes())
        .with_state(state)
}

/// API routes under the /api prefix.
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/knowledge", knowledge::routes())
        .merge(images::routes())
}
