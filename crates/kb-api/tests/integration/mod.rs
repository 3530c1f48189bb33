//! Integration test modules.

pub mod common;
pub mod health_tests;
pub mod image_tests;
pub mod knowledge_tests;
