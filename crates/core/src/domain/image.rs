// Image Item Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::job::JobKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Image item ID (UUID v4)
pub type ItemId = String;

/// Fixed set of styles the item store accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageStyle {
    Realistic,
    Cartoon,
    Anime,
    Watercolor,
    Sketch,
    Cinematic,
    OilPainting,
    PixelArt,
    Comic,
}

impl ImageStyle {
    pub const ALL: [ImageStyle; 9] = [
        ImageStyle::Realistic,
        ImageStyle::Cartoon,
        ImageStyle::Anime,
        ImageStyle::Watercolor,
        ImageStyle::Sketch,
        ImageStyle::Cinematic,
        ImageStyle::OilPainting,
        ImageStyle::PixelArt,
        ImageStyle::Comic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Realistic => "realistic",
            ImageStyle::Cartoon => "cartoon",
            ImageStyle::Anime => "anime",
            ImageStyle::Watercolor => "watercolor",
            ImageStyle::Sketch => "sketch",
            ImageStyle::Cinematic => "cinematic",
            ImageStyle::OilPainting => "oil-painting",
            ImageStyle::PixelArt => "pixel-art",
            ImageStyle::Comic => "comic",
        }
    }
}

impl std::fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStyle {
    type Err = DomainError;

    /// Case-insensitive; accepts `_` and space as separators
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        ImageStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownStyle(s.to_string()))
    }
}

/// Pixel dimensions parsed from a "WxH" string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Parse "1024x1024" (an upper-case `X` is accepted too)
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || DomainError::InvalidResolution(raw.to_string());

        let (w, h) = raw
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Processing,
    Generated,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Processing => "processing",
            ItemStatus::Generated => "generated",
            ItemStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "processing" => Ok(ItemStatus::Processing),
            "generated" => Ok(ItemStatus::Generated),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Image item record
///
/// `resolution` keeps the exact string the producer sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    pub id: ItemId,
    pub job_key: JobKey,
    pub script_id: String,
    pub item_scope: String,

    pub prompt: String,
    pub style: ImageStyle,
    pub resolution: String,

    pub url: String,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub attempts: u32,

    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parses_square() {
        let res = Resolution::parse("1024x1024").unwrap();
        assert_eq!(res.width, 1024);
        assert_eq!(res.height, 1024);
        assert_eq!(res.to_string(), "1024x1024");
    }

    #[test]
    fn test_resolution_parses_wide_and_uppercase() {
        let res = Resolution::parse("1792X1024").unwrap();
        assert_eq!((res.width, res.height), (1792, 1024));
    }

    #[test]
    fn test_resolution_rejects_garbage() {
        for raw in ["", "1024", "x1024", "1024x", "0x512", "-5x5", "abcxdef", "10x10x10"] {
            assert!(
                Resolution::parse(raw).is_err(),
                "expected '{}' to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_style_parsing_is_lenient_on_case_and_separators() {
        assert_eq!("Anime".parse::<ImageStyle>().unwrap(), ImageStyle::Anime);
        assert_eq!(
            "oil_painting".parse::<ImageStyle>().unwrap(),
            ImageStyle::OilPainting
        );
        assert_eq!(
            "pixel art".parse::<ImageStyle>().unwrap(),
            ImageStyle::PixelArt
        );
        assert!("vaporwave".parse::<ImageStyle>().is_err());
    }

    #[test]
    fn test_style_serializes_kebab_case() {
        let json = serde_json::to_string(&ImageStyle::OilPainting).unwrap();
        assert_eq!(json, "\"oil-painting\"");
    }
}
