pub mod archive;
pub mod credential;
pub mod decoder;
pub mod domain;
pub mod error;
pub mod illustration;
pub mod pipeline;
pub mod ports;
pub mod reader;
pub mod story;
pub mod title;

pub use archive::BookArchiver;
pub use credential::acquire_credential;
pub use domain::{ApiKey, Book, Dimensions, ImageStatus, ImageStyle, Page, StoryRequest};
pub use error::{ArchiveError, GenerationError};
pub use pipeline::{GenerationPipeline, GenerationStage, PipelineSettings, Progress, ProgressReporter};
pub use ports::{
    ChatCompletionService, ChatRequest, CredentialStore, ImageService, PortError, PortResult,
};
pub use reader::ReaderState;
