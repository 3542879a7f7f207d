//! crates/pollen_pages_core/src/decoder.rs
//!
//! Parses JSON out of LLM replies that may be wrapped in markdown code fences.
//!
//! Only a fixed set of fence markers is removed: at most one opener and at
//! most one closer. No other markdown is touched.

use crate::error::GenerationError;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Opening fence rules, tried in order. The first match is stripped and the
/// rest are skipped.
static OPENING_FENCES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // ```json, in any case, with or without a following newline
        Regex::new(r"(?i)^```json\b").expect("static regex"),
        // ```<lang> on its own line
        Regex::new(r"^```[A-Za-z][\w+.-]*[ \t]*\r?\n").expect("static regex"),
        // bare ```
        Regex::new(r"^```").expect("static regex"),
    ]
});

static CLOSING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```$").expect("static regex"));

/// Removes one surrounding code fence, if present, and trims the result.
pub fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();

    if let Some(found) = OPENING_FENCES.iter().find_map(|rule| rule.find(cleaned)) {
        cleaned = &cleaned[found.end()..];
    }
    if let Some(found) = CLOSING_FENCE.find(cleaned) {
        cleaned = &cleaned[..found.start()];
    }

    cleaned.trim()
}

/// Strips code fences from `text` and parses the remainder as JSON.
///
/// All-or-nothing: any parse failure is `MalformedResponse` carrying the
/// original, uncleaned text.
pub fn decode_llm_json(text: &str) -> Result<Value, GenerationError> {
    serde_json::from_str(strip_code_fences(text)).map_err(|_| GenerationError::MalformedResponse {
        raw: text.to_string(),
    })
}
