//! crates/pollen_pages_core/src/pipeline.rs
//!
//! The generation pipeline. Runs one attempt strictly in sequence:
//! title refinement, story text, then one illustration per page, and
//! finally installs the finished book into the reader state.
//!
//! Progress is reported after every stage transition. Reports are purely
//! observational and never affect control flow.

use crate::{
    domain::{ApiKey, Book, ImageStatus, StoryRequest},
    error::GenerationError,
    illustration::build_image_url,
    ports::{ChatCompletionService, ImageService},
    reader::ReaderState,
    story::request_story_for,
    title::refine_title,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

//=========================================================================================
// Progress
//=========================================================================================

/// Where a generation attempt currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationStage {
    Idle,
    RefiningTitle,
    GeneratingStory,
    GeneratingImage { index: usize, total: usize },
    Finalizing,
    Done,
    Failed { reason: String },
}

/// A progress snapshot. `percent` never decreases within one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub percent: u8,
    pub stage: GenerationStage,
    pub label: String,
    pub detail: String,
}

impl Progress {
    pub fn idle() -> Self {
        Self {
            percent: 0,
            stage: GenerationStage::Idle,
            label: String::new(),
            detail: String::new(),
        }
    }
}

/// Receives progress snapshots from the pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: Progress);
}

/// Clamps reported percentages so they never move backwards.
struct MonotonicReporter<'a> {
    inner: &'a dyn ProgressReporter,
    high_water: AtomicU8,
}

impl<'a> MonotonicReporter<'a> {
    fn new(inner: &'a dyn ProgressReporter) -> Self {
        Self {
            inner,
            high_water: AtomicU8::new(0),
        }
    }

    fn emit(&self, percent: u8, stage: GenerationStage, label: String, detail: String) {
        let percent = percent.min(100).max(self.high_water.load(Ordering::Relaxed));
        self.high_water.store(percent, Ordering::Relaxed);
        self.inner.report(Progress {
            percent,
            stage,
            label,
            detail,
        });
    }
}

const TITLE_PERCENT: u8 = 5;
const STORY_PERCENT: u8 = 10;
const IMAGES_START_PERCENT: usize = 15;
const IMAGES_SPAN_PERCENT: usize = 80;
const PROMPT_PREVIEW_CHARS: usize = 40;

fn image_percent(index: usize, total: usize) -> u8 {
    let percent = IMAGES_START_PERCENT + index * IMAGES_SPAN_PERCENT / total.max(1);
    u8::try_from(percent).unwrap_or(100)
}

fn prompt_preview(prompt: &str) -> String {
    let preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
    format!("{preview}...")
}

//=========================================================================================
// Pipeline
//=========================================================================================

/// Settings that do not change between attempts.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Base URL of the generative API, used for image URLs.
    pub api_base: String,
    /// Small model used for title refinement.
    pub title_model: String,
}

#[derive(Clone)]
pub struct GenerationPipeline {
    chat: Arc<dyn ChatCompletionService>,
    images: Arc<dyn ImageService>,
    settings: PipelineSettings,
}

impl GenerationPipeline {
    pub fn new(
        chat: Arc<dyn ChatCompletionService>,
        images: Arc<dyn ImageService>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            chat,
            images,
            settings,
        }
    }

    /// Checks the preconditions of an attempt and marks it in flight.
    ///
    /// Fails with `MissingCredential` before anything else is touched, and
    /// with `GenerationInProgress` if another attempt holds the reader.
    pub async fn begin(
        &self,
        reader: &Mutex<ReaderState>,
        credential: Option<&ApiKey>,
    ) -> Result<ApiKey, GenerationError> {
        let credential = credential.cloned().ok_or(GenerationError::MissingCredential)?;
        reader.lock().await.begin_generation()?;
        Ok(credential)
    }

    /// Runs an attempt that `begin` already admitted, then installs the book
    /// on success. On failure the previous book stays in place.
    pub async fn execute(
        &self,
        reader: &Mutex<ReaderState>,
        request: StoryRequest,
        credential: &ApiKey,
        progress: &dyn ProgressReporter,
    ) -> Result<(), GenerationError> {
        let attempt = Uuid::new_v4();
        let reporter = MonotonicReporter::new(progress);

        let outcome = self
            .generate(&request, credential, &reporter)
            .instrument(info_span!("generation", %attempt))
            .await;

        match outcome {
            Ok(book) => {
                reporter.emit(
                    100,
                    GenerationStage::Finalizing,
                    "Binding the Book...".to_string(),
                    "Ready!".to_string(),
                );
                let title = book.title.clone();
                let pages = book.pages.len();
                reader.lock().await.install(book);
                info!(%attempt, pages, "Generation finished.");
                reporter.emit(100, GenerationStage::Done, title, format!("{pages} pages"));
                Ok(())
            }
            Err(e) => {
                reader.lock().await.abort_generation();
                error!(%attempt, "Generation failed: {}", e);
                reporter.emit(
                    0,
                    GenerationStage::Failed {
                        reason: e.to_string(),
                    },
                    "Generation failed".to_string(),
                    e.user_message().to_string(),
                );
                Err(e)
            }
        }
    }

    /// `begin` followed by `execute`.
    pub async fn run(
        &self,
        reader: &Mutex<ReaderState>,
        request: StoryRequest,
        credential: Option<&ApiKey>,
        progress: &dyn ProgressReporter,
    ) -> Result<(), GenerationError> {
        let credential = self.begin(reader, credential).await?;
        self.execute(reader, request, &credential, progress).await
    }

    async fn generate(
        &self,
        request: &StoryRequest,
        credential: &ApiKey,
        reporter: &MonotonicReporter<'_>,
    ) -> Result<Book, GenerationError> {
        let mut request = request.clone().normalized();

        // --- 1. Title ---
        reporter.emit(
            TITLE_PERCENT,
            GenerationStage::RefiningTitle,
            format!("Polishing the title... ({})", self.settings.title_model),
            "Asking the editor for a better title".to_string(),
        );
        request.title = refine_title(
            self.chat.as_ref(),
            credential,
            &self.settings.title_model,
            &request.title,
            &request.genre,
            &request.premise,
        )
        .await;

        // --- 2. Story text ---
        reporter.emit(
            STORY_PERCENT,
            GenerationStage::GeneratingStory,
            format!("Brainstorming... ({})", request.text_model),
            "Consulting the LLM for the plot".to_string(),
        );
        let mut pages = request_story_for(self.chat.as_ref(), credential, &request)
            .await?
            .pages;
        info!(pages = pages.len(), "Story text received.");

        // --- 3. Illustrations, one page at a time ---
        let total = pages.len();
        for (index, page) in pages.iter_mut().enumerate() {
            reporter.emit(
                image_percent(index, total),
                GenerationStage::GeneratingImage { index, total },
                format!("Painting... ({})", request.image_model),
                format!(
                    "Rendering page {} of {}\n{}",
                    index + 1,
                    total,
                    prompt_preview(&page.illustration_prompt)
                ),
            );

            let url = build_image_url(
                &self.settings.api_base,
                &page.illustration_prompt,
                &request.image_model,
                request.dimensions,
                request.style,
                credential,
            );
            page.image_status = match self.images.fetch_image(&url).await {
                Ok(bytes) if !bytes.is_empty() => ImageStatus::Loaded,
                Ok(_) => ImageStatus::Failed {
                    reason: "empty image body".to_string(),
                },
                Err(e) => {
                    warn!(page = index + 1, "Illustration preload failed: {}", e);
                    ImageStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            page.image_url = Some(url);
        }

        Ok(Book {
            title: request.title,
            pages,
            generated_at: Utc::now(),
        })
    }
}
