//! crates/pollen_pages_core/src/title.rs
//!
//! Asks the text model for a better working title. Purely cosmetic: any
//! failure falls back to the title the user typed.

use crate::{
    domain::ApiKey,
    ports::{ChatCompletionService, ChatMessage, ChatRequest},
};
use tracing::{info, warn};

/// Refined titles must be strictly shorter than this many characters.
pub const MAX_TITLE_CHARS: usize = 100;

const TITLE_TEMPERATURE: f32 = 0.8;

const SYSTEM_INSTRUCTIONS: &str = "You are an expert book editor. Improve the working title of a \
children's storybook so it is evocative and memorable. Respond with ONLY the new title, \
no quotes, no explanation.";

/// Builds the title refinement request. No JSON output is requested.
pub fn build_title_request(original: &str, genre: &str, premise: &str, model: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::system(SYSTEM_INSTRUCTIONS),
            ChatMessage::user(format!(
                "Working title: \"{original}\"\nGenre: {genre}\nPremise: {premise}\n\nGive one improved title."
            )),
        ],
        temperature: TITLE_TEMPERATURE,
        json_mode: false,
        response_format: None,
    }
}

/// Trims the model's reply and removes one layer of matching quotes.
/// Returns `None` when the result is empty or too long.
pub fn clean_title(raw: &str) -> Option<String> {
    const QUOTE_PAIRS: [(char, char); 4] = [('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')];

    let trimmed = raw.trim();
    let unquoted = QUOTE_PAIRS
        .iter()
        .find_map(|&(open, close)| {
            trimmed
                .strip_prefix(open)
                .and_then(|rest| rest.strip_suffix(close))
        })
        .unwrap_or(trimmed)
        .trim();

    let length = unquoted.chars().count();
    (length > 0 && length < MAX_TITLE_CHARS).then(|| unquoted.to_string())
}

/// Returns a refined title, or `original` unchanged on any failure.
pub async fn refine_title(
    chat: &dyn ChatCompletionService,
    credential: &ApiKey,
    model: &str,
    original: &str,
    genre: &str,
    premise: &str,
) -> String {
    let request = build_title_request(original, genre, premise, model);
    match chat.complete(credential, &request).await {
        Ok(reply) => match clean_title(&reply) {
            Some(title) => {
                info!("Title refined.");
                title
            }
            None => {
                warn!("Discarding unusable refined title.");
                original.to_string()
            }
        },
        Err(e) => {
            warn!("Title refinement failed, keeping original: {}", e);
            original.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_one_layer_of_quotes() {
        assert_eq!(clean_title("  \"The Brave Fox\" \n").as_deref(), Some("The Brave Fox"));
        assert_eq!(clean_title("'Moonlit'").as_deref(), Some("Moonlit"));
        assert_eq!(clean_title("“Curly”").as_deref(), Some("Curly"));
        assert_eq!(clean_title("\"\"Twice\"\"").as_deref(), Some("\"Twice\""));
        assert_eq!(clean_title("\"Unbalanced").as_deref(), Some("\"Unbalanced"));
    }

    #[test]
    fn rejects_empty_and_overlong() {
        assert_eq!(clean_title("   "), None);
        assert_eq!(clean_title("\"\""), None);
        assert_eq!(clean_title(&"a".repeat(MAX_TITLE_CHARS)), None);
        assert!(clean_title(&"a".repeat(MAX_TITLE_CHARS - 1)).is_some());
    }

    #[test]
    fn title_request_has_no_json_flags() {
        let request = build_title_request("Old", "fantasy", "A dragon.", "openai-fast");
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("jsonMode").is_none());
        assert!(body.get("response_format").is_none());
        assert!(request.messages[1].content.contains("\"Old\""));
    }
}
