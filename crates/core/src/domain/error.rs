// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid job status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Job counter overflow: {completed}/{total} items already completed")]
    CounterOverflow { completed: i64, total: i64 },

    #[error("Invalid resolution '{0}': expected WxH with positive integers")]
    InvalidResolution(String),

    #[error("Unsupported style: {0}")]
    UnknownStyle(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
