//! crates/pollen_pages_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete HTTP client and credential storage.

use crate::domain::ApiKey;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Upstream service responded with status {status}")]
    Upstream { status: u16 },
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Unreadable response: {0}")]
    InvalidResponse(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Chat Completion Request Shape
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// The JSON body of a chat-completion request, serialized as-is onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(rename = "jsonMode", skip_serializing_if = "std::ops::Not::not")]
    pub json_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// Sends a chat-completion request and returns the first choice's message content.
    async fn complete(&self, credential: &ApiKey, request: &ChatRequest) -> PortResult<String>;
}

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Fetches the bytes of a generated illustration.
    async fn fetch_image(&self, url: &str) -> PortResult<Bytes>;
}

/// Persistent key-value storage for the bearer credential.
///
/// Both operations are best-effort: a failing backend reads as empty and
/// reports `false` on save.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, value: &str) -> bool;
}
