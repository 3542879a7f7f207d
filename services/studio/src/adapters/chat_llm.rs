//! services/studio/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the chat-completion endpoint of the
//! generative API. It implements the `ChatCompletionService` port from the
//! `core` crate and is shared by story writing and title refinement.

use async_trait::async_trait;
use pollen_pages_core::{
    domain::ApiKey,
    ports::{ChatCompletionService, ChatRequest, PortError, PortResult},
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatCompletionService` over plain HTTP.
#[derive(Clone)]
pub struct PollenChatAdapter {
    client: Client,
    endpoint: String,
}

impl PollenChatAdapter {
    /// Creates a new `PollenChatAdapter` with an explicit per-request timeout.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", api_base.trim_end_matches('/')),
        })
    }
}

//=========================================================================================
// Wire Response Structs
//=========================================================================================

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Pulls the first choice's content out of a completion response.
fn first_content(response: ChatResponse) -> PortResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            PortError::InvalidResponse("Chat response contained no message content.".to_string())
        })
}

pub(crate) fn map_transport_error(e: reqwest::Error) -> PortError {
    if let Some(status) = e.status() {
        PortError::Upstream {
            status: status.as_u16(),
        }
    } else if e.is_timeout() {
        PortError::Transport("request timed out".to_string())
    } else {
        PortError::Transport(e.without_url().to_string())
    }
}

//=========================================================================================
// `ChatCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatCompletionService for PollenChatAdapter {
    async fn complete(&self, credential: &ApiKey, request: &ChatRequest) -> PortResult<String> {
        debug!(model = %request.model, json_mode = request.json_mode, "Sending chat completion.");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "Chat completion request rejected.");
            return Err(PortError::Upstream {
                status: status.as_u16(),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| PortError::InvalidResponse(e.without_url().to_string()))?;

        first_content(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_derived_from_base() {
        let adapter = PollenChatAdapter::new("https://gen.test/", Duration::from_secs(5)).unwrap();
        assert_eq!(adapter.endpoint, "https://gen.test/v1/chat/completions");
    }

    #[test]
    fn first_choice_content_is_returned() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"```json\n{}\n```"}},{"message":{"content":"second"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(body).unwrap(), "```json\n{}\n```");
    }

    #[test]
    fn empty_choices_are_an_error() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_content(body), Err(PortError::InvalidResponse(_))));

        let body: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(first_content(body), Err(PortError::InvalidResponse(_))));
    }
}
