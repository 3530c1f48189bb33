//! Shared test helpers for the kb-api crate.
//!
//! Each helper builds an isolated in-memory SQLite database and a temporary
//! image folder, so tests can run in parallel.

use tempfile::TempDir;
use uuid::Uuid;

use kb_core::db::{create_pool_with_options, run_migrations, DbPool, PoolOptions};
use kb_core::{ImageStore, KnowledgeRecord, RecordInput};

use crate::state::AppState;

/// Creates an in-memory SQLite pool with the knowledge schema applied.
pub async fn setup_test_db() -> DbPool {
    let db_url = format!(
        "sqlite:file:test_db_{}?mode=memory&cache=shared",
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

/// Creates application state over a fresh database and image folder.
///
/// The returned `TempDir` must be kept alive for the duration of the test.
pub async fn create_test_state() -> (AppState, TempDir) {
    let pool = setup_test_db().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    let images = ImageStore::new(dir.path(), "http://localhost:8085");
    (AppState::new(pool, images), dir)
}

/// Inserts a record through the service layer.
pub async fn seed_record(state: &AppState, record: KnowledgeRecord) -> KnowledgeRecord {
    let input = RecordInput {
        id: Some(record.id),
        fields: record.fields,
    };
    state
        .knowledge
        .create(input)
        .await
        .expect("Failed to seed record")
}
