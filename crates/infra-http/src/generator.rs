// HTTP ImageGenerator
//
// POST {prompt, width, height} as JSON; the response body is the image.

use crate::client::{ensure_success, transport_error};
use async_trait::async_trait;
use frameforge_core::port::{CapabilityError, ImageGenerator};
use serde::Serialize;
use tracing::debug;

const SERVICE: &str = "generator";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    width: u32,
    height: u32,
}

pub struct HttpImageGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpImageGenerator {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, CapabilityError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                prompt,
                width,
                height,
            })
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        if bytes.is_empty() {
            return Err(CapabilityError::Transient(
                "generator returned an empty image".to_string(),
            ));
        }

        debug!(width, height, bytes = bytes.len(), "Image generated");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_client;
    use crate::test_support::{dead_url, serve, CannedResponse};
    use std::time::Duration;

    fn generator(url: &str) -> HttpImageGenerator {
        let client = build_client(Duration::from_secs(5)).unwrap();
        HttpImageGenerator::new(client, format!("{}/generate", url))
    }

    #[tokio::test]
    async fn test_generate_returns_body_bytes() {
        let (url, server) = serve(vec![CannedResponse::new(
            200,
            "image/png",
            b"\x89PNG fake".to_vec(),
        )])
        .await;

        let bytes = generator(&url)
            .generate("a lantern, cinematic still", 1024, 768)
            .await
            .unwrap();
        assert_eq!(bytes, b"\x89PNG fake");

        let requests = server.await.unwrap();
        let sent: serde_json::Value = serde_json::from_str(&requests[0]).unwrap();
        assert_eq!(sent["prompt"], "a lantern, cinematic still");
        assert_eq!(sent["width"], 1024);
        assert_eq!(sent["height"], 768);
    }

    #[tokio::test]
    async fn test_service_unavailable_is_transient() {
        let (url, _server) =
            serve(vec![CannedResponse::new(503, "text/plain", "overloaded")]).await;

        let err = generator(&url).generate("x", 64, 64).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_bad_request_is_rejected() {
        let (url, _server) = serve(vec![CannedResponse::new(
            400,
            "application/json",
            r#"{"error":"prompt blocked"}"#,
        )])
        .await;

        let err = generator(&url).generate("x", 64, 64).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_empty_body_is_transient() {
        let (url, _server) = serve(vec![CannedResponse::new(200, "image/png", Vec::new())]).await;

        let err = generator(&url).generate("x", 64, 64).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let url = dead_url().await;
        let err = generator(&url).generate("x", 64, 64).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
