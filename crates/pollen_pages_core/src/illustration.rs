//! crates/pollen_pages_core/src/illustration.rs
//!
//! Builds image-generation URLs. The upstream API takes the credential as
//! the `key` query parameter, so every URL built here is a secret and must
//! not be logged.

use crate::domain::{ApiKey, Dimensions, ImageStyle};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::Rng;

/// Seeds are drawn from `0..SEED_RANGE_END`.
pub const SEED_RANGE_END: u32 = 1_000_000;

/// Appended when no style is chosen.
pub const GENERIC_SUFFIX: &str = " masterpiece, high quality, trending on artstation";

/// Same set `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

impl ImageStyle {
    /// The fixed prompt suffix for this style.
    pub fn prompt_suffix(self) -> &'static str {
        match self {
            ImageStyle::Anime => ", anime style, studio ghibli, makoto shinkai",
            ImageStyle::ComicBook => ", comic book style, marvel, dc, graphic novel, highly detailed",
            ImageStyle::Photorealistic => {
                ", photorealistic, 8k, highly detailed, raw photo, realistic textures"
            }
            ImageStyle::Watercolor => ", beautiful watercolor painting, artistic, expressive strokes",
            ImageStyle::ThreeDModel => ", 3d render, octane render, unreal engine 5, ray tracing",
            ImageStyle::Cyberpunk => ", cyberpunk, neon lights, futuristic, highly detailed, sci-fi",
            ImageStyle::PixelArt => ", 16-bit pixel art, retro gaming style, crisp pixels",
        }
    }
}

/// The prompt sent to the image model: the style suffix or the generic one,
/// never both.
pub fn styled_prompt(prompt: &str, style: Option<ImageStyle>) -> String {
    let suffix = style.map_or(GENERIC_SUFFIX, ImageStyle::prompt_suffix);
    format!("{prompt}{suffix}")
}

/// Builds an image URL with an explicit seed.
pub fn build_image_url_with_seed(
    api_base: &str,
    prompt: &str,
    image_model: &str,
    dimensions: Dimensions,
    style: Option<ImageStyle>,
    credential: &ApiKey,
    seed: u32,
) -> String {
    let encode = |value: &str| utf8_percent_encode(value, URI_COMPONENT).to_string();
    format!(
        "{base}/image/{prompt}?model={model}&width={width}&height={height}&nologo=true&enhance=true&key={key}&seed={seed}",
        base = api_base.trim_end_matches('/'),
        prompt = encode(&styled_prompt(prompt, style)),
        model = encode(image_model),
        width = dimensions.width,
        height = dimensions.height,
        key = encode(credential.expose()),
    )
}

/// Builds an image URL with a freshly drawn seed so repeated prompts do not
/// hit cached output.
pub fn build_image_url(
    api_base: &str,
    prompt: &str,
    image_model: &str,
    dimensions: Dimensions,
    style: Option<ImageStyle>,
    credential: &ApiKey,
) -> String {
    let seed = rand::rng().random_range(0..SEED_RANGE_END);
    build_image_url_with_seed(api_base, prompt, image_model, dimensions, style, credential, seed)
}
