//! Errors raised by knowledge operations.

use thiserror::Error;

use crate::db::DbError;

/// Errors produced while turning a sparse filter into a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// No field in the filter, or in any nested `AND` filter, is populated.
    #[error("filter has no populated fields")]
    Empty,

    #[error("unknown filter field '{0}'")]
    UnknownField(String),

    #[error("filter field '{field}' expects {expected}")]
    KindMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("invalid pattern for '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },
}

/// Service-level failure of a knowledge operation.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    /// Malformed or missing client input.
    #[error("{0}")]
    InvalidInput(String),

    #[error("knowledge record '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl From<FilterError> for KnowledgeError {
    fn from(err: FilterError) -> Self {
        KnowledgeError::InvalidInput(err.to_string())
    }
}

impl From<regex::Error> for KnowledgeError {
    fn from(err: regex::Error) -> Self {
        KnowledgeError::InvalidInput(format!("invalid pattern: {}", err))
    }
}
