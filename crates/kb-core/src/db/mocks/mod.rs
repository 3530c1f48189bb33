//! Mock implementations of repository traits for testing.
//!
//! These mocks use in-memory storage and do not require a database connection.

mod knowledge_repo;

pub use knowledge_repo::MockKnowledgeRepository;
