// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Missing or malformed request fields. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generation/upload failure that survived the retry budget
    #[error("External capability failed: {0}")]
    Transient(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Worker fault: {0}")]
    WorkerFault(String),

    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Persistence(String)
