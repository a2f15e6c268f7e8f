// Prompt enrichment: pure function of (prompt, style)

use crate::domain::ImageStyle;

fn style_description(style: ImageStyle) -> &'static str {
    match style {
        ImageStyle::Realistic => {
            "photorealistic, natural lighting, highly detailed, sharp focus, 8k photograph"
        }
        ImageStyle::Cartoon => "cartoon style, bold outlines, vibrant flat colors, playful",
        ImageStyle::Anime => "anime style, cel shading, expressive characters, studio quality",
        ImageStyle::Watercolor => "watercolor painting, soft washes, paper texture, gentle bleeding edges",
        ImageStyle::Sketch => "pencil sketch, graphite shading, hand-drawn lines, monochrome",
        ImageStyle::Cinematic => {
            "cinematic still, dramatic lighting, shallow depth of field, anamorphic widescreen"
        }
        ImageStyle::OilPainting => "oil painting, rich impasto brushstrokes, classical composition",
        ImageStyle::PixelArt => "pixel art, 16-bit palette, crisp pixels, retro game aesthetic",
        ImageStyle::Comic => "comic book panel, ink outlines, halftone shading, dynamic framing",
    }
}

/// Append the style description to the scene prompt
///
/// Unknown styles fall back to a generic "in a {style} style" phrase.
pub fn enrich_prompt(prompt: &str, style: &str) -> String {
    let prompt = prompt.trim();
    match style.parse::<ImageStyle>() {
        Ok(known) => format!("{}, {}", prompt, style_description(known)),
        Err(_) => format!("{}, in a {} style", prompt, style.trim()),
    }
}
