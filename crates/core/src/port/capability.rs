// External capability errors (generation & storage)

use thiserror::Error;

/// Failure reported by an external capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// Network or service failure; worth another attempt
    #[error("transient failure: {0}")]
    Transient(String),

    /// The service refused the input; retrying cannot help
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl CapabilityError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CapabilityError::Transient(_))
    }
}
