// Shared HTTP client setup and error classification

use frameforge_core::error::AppError;
use frameforge_core::port::CapabilityError;
use reqwest::StatusCode;
use std::time::Duration;

/// Longest response excerpt kept in error messages
const MAX_ERROR_BODY: usize = 256;

/// One client per process; reqwest pools connections internally
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Network, DNS, TLS and timeout failures are all worth another attempt
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> CapabilityError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    CapabilityError::Transient(format!("{} {}: {}", service, kind, err))
}

/// 5xx, 408 and 429 are retried; any other non-success status is final
pub(crate) fn status_error(service: &str, status: StatusCode, body: &str) -> CapabilityError {
    let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = format!("{} returned {}: {}", service, status, excerpt.trim());

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        CapabilityError::Transient(message)
    } else {
        CapabilityError::Rejected(message)
    }
}

/// Turn a non-success response into a classified error
pub(crate) async fn ensure_success(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, CapabilityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(service, status, &body))
}
