// HTTP ImageStorage
//
// Uploads the image as a base64 data URI together with the target folder and
// optional transformation; the permanent URL comes back as `secure_url`.

use crate::client::{ensure_success, transport_error};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use frameforge_core::port::{CapabilityError, ImageStorage, UploadTarget};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "storage";

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    file: String,
    folder: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transformation: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Guess the MIME type from the leading magic bytes
fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

fn data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(bytes), STANDARD.encode(bytes))
}

pub struct HttpImageStorage {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpImageStorage {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ImageStorage for HttpImageStorage {
    async fn upload(
        &self,
        bytes: &[u8],
        target: &UploadTarget,
    ) -> Result<String, CapabilityError> {
        if bytes.is_empty() {
            return Err(CapabilityError::Rejected("refusing to upload an empty image".to_string()));
        }

        let request = UploadRequest {
            file: data_uri(bytes),
            folder: &target.folder,
            transformation: target.transformation.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            CapabilityError::Transient(format!("storage returned an unreadable response: {}", e))
        })?;

        debug!(folder = %target.folder, url = %uploaded.secure_url, "Image uploaded");
        Ok(uploaded.secure_url)
    }
}
