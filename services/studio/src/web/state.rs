//! services/studio/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use pollen_pages_core::{
    ports::CredentialStore, ApiKey, BookArchiver, GenerationPipeline, Progress, ProgressReporter,
    ReaderState,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<GenerationPipeline>,
    pub archiver: Arc<BookArchiver>,
    pub credential_store: Arc<dyn CredentialStore>,
    /// The active credential. Replaced whenever a new key is connected.
    pub credential: RwLock<Option<ApiKey>>,
    /// The active book, cursor, and in-flight flag. Never held across a network call.
    pub reader: Mutex<ReaderState>,
    progress: watch::Sender<Progress>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        pipeline: Arc<GenerationPipeline>,
        archiver: Arc<BookArchiver>,
        credential_store: Arc<dyn CredentialStore>,
        credential: Option<ApiKey>,
    ) -> Self {
        let (progress, _) = watch::channel(Progress::idle());
        Self {
            config,
            pipeline,
            archiver,
            credential_store,
            credential: RwLock::new(credential),
            reader: Mutex::new(ReaderState::new()),
            progress,
        }
    }

    pub fn latest_progress(&self) -> Progress {
        self.progress.borrow().clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }
}

/// Publishes pipeline progress to every subscriber of the progress channel.
impl ProgressReporter for AppState {
    fn report(&self, progress: Progress) {
        self.progress.send_replace(progress);
    }
}
