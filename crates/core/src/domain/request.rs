// Item Request (queue message schema)

use crate::domain::error::{DomainError, Result};
use crate::domain::image::{ImageStyle, Resolution};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STYLE: &str = "realistic";
pub const DEFAULT_RESOLUTION: &str = "1024x1024";

/// Optional producer metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    #[serde(default)]
    pub total_items: Option<i64>,
}

/// One image-generation request as delivered by the queue
///
/// Required string fields default to empty so that a missing field is
/// reported by [`ItemRequest::validate`] instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    #[serde(default)]
    pub job_key: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub script_id: String,
    #[serde(default)]
    pub item_scope: String,
    #[serde(default)]
    pub metadata: Option<RequestMetadata>,
}

/// Validated, parsed view of a request
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSpec {
    pub style: ImageStyle,
    pub resolution: Resolution,
    /// Resolution exactly as requested, echoed back unchanged
    pub resolution_raw: String,
    pub total_items: i64,
}

impl ItemRequest {
    /// Style string with the default applied
    pub fn style_or_default(&self) -> &str {
        self.style
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_STYLE)
    }

    /// Resolution string with the default applied
    pub fn resolution_or_default(&self) -> &str {
        self.resolution
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_RESOLUTION)
    }

    pub fn total_items(&self) -> i64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.total_items)
            .unwrap_or(1)
    }

    /// Check required fields and parse style/resolution
    pub fn validate(&self) -> Result<ItemSpec> {
        let missing: Vec<&str> = [
            ("jobKey", &self.job_key),
            ("userId", &self.user_id),
            ("prompt", &self.prompt),
            ("scriptId", &self.script_id),
            ("itemScope", &self.item_scope),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(DomainError::ValidationError(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let total_items = self.total_items();
        if total_items < 1 {
            return Err(DomainError::ValidationError(format!(
                "metadata.totalItems must be at least 1, got {}",
                total_items
            )));
        }

        let style: ImageStyle = self.style_or_default().parse()?;
        let resolution_raw = self.resolution_or_default().to_string();
        let resolution = Resolution::parse(&resolution_raw)?;

        Ok(ItemSpec {
            style,
            resolution,
            resolution_raw,
            total_items,
        })
    }
}
