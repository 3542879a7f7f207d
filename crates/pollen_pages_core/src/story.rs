//! crates/pollen_pages_core/src/story.rs
//!
//! The story client: builds the story-writing chat request, sends it through
//! the `ChatCompletionService` port, and decodes the reply into pages.

use crate::{
    decoder::decode_llm_json,
    domain::{ApiKey, Page, StoryRequest},
    error::GenerationError,
    ports::{ChatCompletionService, ChatMessage, ChatRequest, ResponseFormat},
};
use serde::Deserialize;
use serde_json::Value;

/// Sampling temperature for story text.
pub const STORY_TEMPERATURE: f32 = 0.7;

/// Model families that only emit reliable JSON with an explicit
/// `response_format` of `json_object`.
const STRICT_JSON_FAMILIES: &[&str] = &["openai"];

/// Whether `model` belongs to a family that needs the strict JSON flag.
/// Matches the family name itself and any `<family>-<variant>` id.
pub fn requires_strict_json(model: &str) -> bool {
    let model = model.trim();
    STRICT_JSON_FAMILIES.iter().any(|family| {
        model == *family
            || model
                .strip_prefix(*family)
                .is_some_and(|rest| rest.starts_with('-'))
    })
}

/// The system prompt for story writing.
pub fn system_prompt(genre: &str, page_count: u32) -> String {
    format!(
        "You are a master storyteller writing a {genre} storybook for a premium app.\n\
         Respond ONLY with a JSON object containing a \"pages\" array.\n\
         Each page object must have: \"pageNumber\" (1 to {page_count}), \"text\" (2-3 engaging paragraphs), \
         and \"illustrationPrompt\" (detailed comma-separated visual description of the scene for an AI image \
         generator, focus on subject, environment, lighting, and style)."
    )
}

/// The user prompt for story writing.
pub fn user_prompt(title: &str, premise: &str, page_count: u32) -> String {
    format!(
        "Title: \"{title}\". Core Idea: {premise}. Total exact pages: {page_count}. Write the complete storybook."
    )
}

/// Builds the chat request body for a story. `jsonMode` is always set; the
/// strict `response_format` flag only for models that need it.
pub fn build_story_request(user_prompt: &str, system_prompt: &str, text_model: &str) -> ChatRequest {
    ChatRequest {
        model: text_model.to_string(),
        messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
        temperature: STORY_TEMPERATURE,
        json_mode: true,
        response_format: requires_strict_json(text_model).then(ResponseFormat::json_object),
    }
}

//=========================================================================================
// Story Document
//=========================================================================================

/// The decoded story: an ordered, non-empty list of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryDocument {
    pub pages: Vec<Page>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageRecord {
    #[serde(default)]
    page_number: Value,
    #[serde(default)]
    text: String,
    #[serde(default)]
    illustration_prompt: String,
}

impl StoryDocument {
    /// Extracts the page collection from a decoded reply.
    ///
    /// `pages` must be a non-empty array of objects. Missing text fields
    /// decode as empty and a missing `pageNumber` takes the page's position.
    /// Numeric strings and whole floats are accepted as page numbers; any
    /// other value is treated as missing.
    pub fn from_value(value: Value) -> Result<Self, GenerationError> {
        let pages = match value {
            Value::Object(mut map) => map.remove("pages"),
            _ => None,
        };
        let Some(Value::Array(entries)) = pages else {
            return Err(GenerationError::InvalidStoryStructure(
                "missing \"pages\" array".to_string(),
            ));
        };
        if entries.is_empty() {
            return Err(GenerationError::InvalidStoryStructure(
                "\"pages\" array is empty".to_string(),
            ));
        }

        let pages = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let record: PageRecord = serde_json::from_value(entry).map_err(|e| {
                    GenerationError::InvalidStoryStructure(format!("page {}: {}", index + 1, e))
                })?;
                let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
                Ok(Page::new(
                    lenient_page_number(&record.page_number).unwrap_or(position),
                    record.text,
                    record.illustration_prompt,
                ))
            })
            .collect::<Result<Vec<_>, GenerationError>>()?;

        Ok(Self { pages })
    }
}

fn lenient_page_number(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(number).ok()
}

//=========================================================================================
// Story Client
//=========================================================================================

/// Requests a story and decodes it into a `StoryDocument`.
pub async fn request_story(
    chat: &dyn ChatCompletionService,
    credential: &ApiKey,
    user_prompt: &str,
    system_prompt: &str,
    text_model: &str,
) -> Result<StoryDocument, GenerationError> {
    let request = build_story_request(user_prompt, system_prompt, text_model);
    let content = chat.complete(credential, &request).await?;
    StoryDocument::from_value(decode_llm_json(&content)?)
}

/// Convenience wrapper that builds both prompts from a `StoryRequest`.
pub async fn request_story_for(
    chat: &dyn ChatCompletionService,
    credential: &ApiKey,
    request: &StoryRequest,
) -> Result<StoryDocument, GenerationError> {
    request_story(
        chat,
        credential,
        &user_prompt(&request.title, &request.premise, request.page_count),
        &system_prompt(&request.genre, request.page_count),
        &request.text_model,
    )
    .await
}
