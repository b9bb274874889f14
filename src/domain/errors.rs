//! Domain errors for the scanforge controller.

use thiserror::Error;

/// Domain-level errors. Nothing here is fatal: every failure mode is
/// representable in persisted workflow/job state, and the HTTP layer maps
/// the taxonomy onto status codes.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Scan job not found: {0}")]
    JobNotFound(String),

    #[error("VPN profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Dispatch failed for job {job_id}: {reason}")]
    Dispatch { job_id: String, reason: String },

    #[error("Malformed result payload: {0}")]
    Ingestion(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Execution backend error: {0}")]
    Backend(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
