//! Database layer for Knowledge Warden.
//!
//! This module provides persistence for knowledge records using SQLx with
//! support for both SQLite (development) and PostgreSQL (production).

mod error;
pub mod knowledge_repo;
pub mod mocks;
mod pool;
mod schema;

pub use error::DbError;
pub use knowledge_repo::KnowledgeRepository;
pub use pool::{create_pool, create_pool_with_options, DbPool, PoolOptions};
pub use schema::run_migrations;

#[cfg(feature = "database")]
pub use knowledge_repo::{
    create_knowledge_repository, PgKnowledgeRepository, SqliteKnowledgeRepository,
};
