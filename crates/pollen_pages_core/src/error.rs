//! crates/pollen_pages_core/src/error.rs
//!
//! Error types surfaced by the generation pipeline and the archiver.

use crate::ports::PortError;

/// Fatal failures of a generation attempt. Any of these aborts the attempt
/// and leaves the previously installed book untouched.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("No API key is configured")]
    MissingCredential,

    #[error("A generation is already in progress")]
    GenerationInProgress,

    #[error("Upstream service responded with status {status}")]
    Upstream { status: u16 },

    #[error("Transport failure: {0}")]
    Transport(String),

    /// The model's reply could not be parsed as JSON. Carries the raw reply.
    #[error("Model response was not valid JSON")]
    MalformedResponse { raw: String },

    #[error("Invalid story structure generated: {0}")]
    InvalidStoryStructure(String),
}

impl GenerationError {
    /// The message shown to the user when a generation fails.
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationError::MissingCredential => {
                "Please connect your Pollinations API Key first to generate stories."
            }
            GenerationError::GenerationInProgress => {
                "A story is already being generated. Please wait for it to finish."
            }
            _ => "Generation failed. Please try a simpler prompt or switch Text Models.",
        }
    }
}

impl From<PortError> for GenerationError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Upstream { status } => GenerationError::Upstream { status },
            PortError::InvalidResponse(raw) => GenerationError::MalformedResponse { raw },
            PortError::Transport(msg) | PortError::Unexpected(msg) => {
                GenerationError::Transport(msg)
            }
        }
    }
}

/// The packaging step failed. The in-memory book is never affected.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to write archive entry: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error while packaging: {0}")]
    Io(#[from] std::io::Error),
}
