//! Storage error types

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {kind} {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        StorageError::NotFound { kind, id }
    }
}
