//! Data Transfer Objects (DTOs) shared across routes.

use kb_core::{KnowledgeRecord, OperationStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Knowledge DTOs
// ============================================================================

/// A knowledge record as returned by the API: the record's attributes
/// flattened next to optional status fields.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KnowledgeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub record: KnowledgeRecord,
}

impl KnowledgeResponse {
    pub fn with_status(record: KnowledgeRecord, message: impl Into<String>) -> Self {
        Self {
            success: Some(true),
            message: Some(message.into()),
            record,
        }
    }

    pub fn flagged(record: KnowledgeRecord) -> Self {
        Self {
            success: Some(true),
            message: None,
            record,
        }
    }
}

impl From<KnowledgeRecord> for KnowledgeResponse {
    fn from(record: KnowledgeRecord) -> Self {
        Self {
            success: None,
            message: None,
            record,
        }
    }
}

/// Success flag plus message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

impl From<OperationStatus> for StatusResponse {
    fn from(status: OperationStatus) -> Self {
        Self {
            success: status.success,
            message: status.message,
        }
    }
}

// ============================================================================
// Health DTOs
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub uptime_seconds: u64,
}

/// Database health status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub db_type: String,
    pub pool_size: u32,
    pub idle_connections: usize,
}
