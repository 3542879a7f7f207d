//! crates/pollen_pages_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any HTTP client or storage backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Title used when the user leaves the title field blank.
pub const DEFAULT_TITLE: &str = "The Unknown Journey";

/// Premise used when the user leaves the idea field blank.
pub const DEFAULT_PREMISE: &str = "An epic spontaneous adventure.";

/// Separator between narrative paragraphs in a page's text.
pub const PARAGRAPH_BREAK: &str = "\n\n";

//=========================================================================================
// Credential
//=========================================================================================

/// The bearer credential for the generative API.
///
/// `Debug` is redacted; the raw value is only reachable through `expose`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a raw key, rejecting blank input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

//=========================================================================================
// Story Request
//=========================================================================================

/// Pixel dimensions for generated illustrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error returned when a `"<W>x<H>"` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid dimensions '{0}', expected WIDTHxHEIGHT")]
pub struct ParseDimensionsError(pub String);

impl FromStr for Dimensions {
    type Err = ParseDimensionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDimensionsError(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(err)?;
        let width = w.trim().parse::<u32>().map_err(|_| err())?;
        let height = h.trim().parse::<u32>().map_err(|_| err())?;
        Self::new(width, height).ok_or_else(err)
    }
}

/// The named illustration styles. Each maps to a fixed prompt suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageStyle {
    Anime,
    ComicBook,
    Photorealistic,
    Watercolor,
    #[serde(rename = "3d-model")]
    ThreeDModel,
    Cyberpunk,
    PixelArt,
}

impl ImageStyle {
    pub const ALL: [ImageStyle; 7] = [
        ImageStyle::Anime,
        ImageStyle::ComicBook,
        ImageStyle::Photorealistic,
        ImageStyle::Watercolor,
        ImageStyle::ThreeDModel,
        ImageStyle::Cyberpunk,
        ImageStyle::PixelArt,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            ImageStyle::Anime => "anime",
            ImageStyle::ComicBook => "comic-book",
            ImageStyle::Photorealistic => "photorealistic",
            ImageStyle::Watercolor => "watercolor",
            ImageStyle::ThreeDModel => "3d-model",
            ImageStyle::Cyberpunk => "cyberpunk",
            ImageStyle::PixelArt => "pixel-art",
        }
    }

    /// Looks up a style by its tag. Unknown or blank tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL.into_iter().find(|style| style.tag() == tag)
    }
}

/// Everything needed to run one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRequest {
    pub title: String,
    pub genre: String,
    pub page_count: u32,
    pub premise: String,
    pub text_model: String,
    pub image_model: String,
    pub dimensions: Dimensions,
    pub style: Option<ImageStyle>,
}

impl StoryRequest {
    /// Fills blank title and premise with the defaults and clamps the page
    /// count to at least one.
    pub fn normalized(mut self) -> Self {
        if self.title.trim().is_empty() {
            self.title = DEFAULT_TITLE.to_string();
        } else {
            self.title = self.title.trim().to_string();
        }
        if self.premise.trim().is_empty() {
            self.premise = DEFAULT_PREMISE.to_string();
        }
        self.page_count = self.page_count.max(1);
        self
    }
}

//=========================================================================================
// Book and Pages
//=========================================================================================

/// Outcome of preloading a page's illustration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    Loaded,
    Failed { reason: String },
}

/// One unit of the storybook: narrative text plus one illustration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
    pub illustration_prompt: String,
    /// Absent until the illustration stage has run for this page.
    pub image_url: Option<String>,
    pub image_status: ImageStatus,
}

impl Page {
    pub fn new(page_number: u32, text: String, illustration_prompt: String) -> Self {
        Self {
            page_number,
            text,
            illustration_prompt,
            image_url: None,
            image_status: ImageStatus::Pending,
        }
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.text
            .split(PARAGRAPH_BREAK)
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// A finished storybook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub title: String,
    pub pages: Vec<Page>,
    pub generated_at: DateTime<Utc>,
}
