//! services/studio/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI document.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Redirect},
};
use pollen_pages_core::{
    acquire_credential, archive::folder_name, credential::fragment_for, ApiKey, Book, Dimensions,
    GenerationError, GenerationStage, ImageStatus, ImageStyle, Page, Progress, ProgressReporter,
    ReaderState, StoryRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        status_handler,
        connect_credential_handler,
        connect_redirect_handler,
        generate_book_handler,
        progress_handler,
        current_book_handler,
        next_page_handler,
        prev_page_handler,
        jump_to_page_handler,
        archive_handler,
    ),
    components(
        schemas(
            StatusResponse,
            CredentialRequest,
            GenerateBookRequest,
            GenerationAccepted,
            ProgressResponse,
            BookResponse,
            PageResponse,
        )
    ),
    tags(
        (name = "PollenPages API", description = "Generate, read, and export illustrated storybooks.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, String);

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub connected: bool,
    pub generating: bool,
    pub has_book: bool,
}

/// Either the raw URL fragment the browser landed with, or a key typed by hand.
#[derive(Deserialize, ToSchema)]
pub struct CredentialRequest {
    pub fragment: Option<String>,
    pub api_key: Option<String>,
}

/// The generation form. Blank fields fall back to the configured defaults.
#[derive(Deserialize, ToSchema)]
pub struct GenerateBookRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_genre")]
    pub genre: String,
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default)]
    pub idea: String,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    /// `WIDTHxHEIGHT`, e.g. `1024x1024`.
    pub dimensions: Option<String>,
    /// One of the style tags; blank or unknown tags use the generic suffix.
    pub style: Option<String>,
}

fn default_genre() -> String {
    "fantasy".to_string()
}

fn default_pages() -> u32 {
    5
}

#[derive(Serialize, ToSchema)]
pub struct GenerationAccepted {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProgressResponse {
    pub percent: u8,
    /// The pipeline stage as a JSON object with a `kind` tag.
    #[schema(value_type = Object)]
    pub stage: serde_json::Value,
    pub label: String,
    pub detail: String,
}

impl From<Progress> for ProgressResponse {
    fn from(progress: Progress) -> Self {
        Self {
            percent: progress.percent,
            stage: serde_json::to_value(&progress.stage).unwrap_or_default(),
            label: progress.label,
            detail: progress.detail,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PageResponse {
    pub page_number: u32,
    pub paragraphs: Vec<String>,
    pub illustration_prompt: String,
    pub image_url: Option<String>,
    pub image_loaded: bool,
}

impl From<&Page> for PageResponse {
    fn from(page: &Page) -> Self {
        Self {
            page_number: page.page_number,
            paragraphs: page.paragraphs().map(str::to_string).collect(),
            illustration_prompt: page.illustration_prompt.clone(),
            image_url: page.image_url.clone(),
            image_loaded: page.image_status == ImageStatus::Loaded,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub title: String,
    pub page_count: usize,
    pub cursor: usize,
    pub current_page: PageResponse,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

fn book_response(reader: &ReaderState) -> Result<BookResponse, HandlerError> {
    let (Some(book), Some(page)) = (reader.book(), reader.current_page()) else {
        return Err((StatusCode::NOT_FOUND, "No book has been generated yet".to_string()));
    };
    Ok(BookResponse {
        title: book.title.clone(),
        page_count: book.pages.len(),
        cursor: reader.cursor(),
        current_page: PageResponse::from(page),
        generated_at: book.generated_at,
    })
}

impl GenerateBookRequest {
    fn into_story_request(self, state: &AppState) -> Result<StoryRequest, HandlerError> {
        let dimensions = match self.dimensions.as_deref().map(str::trim) {
            None | Some("") => Dimensions::default(),
            Some(raw) => raw
                .parse::<Dimensions>()
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        };
        let or_default = |value: Option<String>, default: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Ok(StoryRequest {
            title: self.title,
            genre: self.genre,
            page_count: self.pages,
            premise: self.idea,
            text_model: or_default(self.text_model, &state.config.text_model),
            image_model: or_default(self.image_model, &state.config.image_model),
            dimensions,
            style: self.style.as_deref().and_then(ImageStyle::from_tag),
        }
        .normalized())
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Report whether a key is connected and what the reader holds.
#[utoipa::path(
    get,
    path = "/status",
    responses((status = 200, description = "Current status", body = StatusResponse))
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let connected = state.credential.read().await.is_some();
    let reader = state.reader.lock().await;
    Json(StatusResponse {
        connected,
        generating: reader.is_generating(),
        has_book: reader.book().is_some(),
    })
}

/// Connect an API key.
///
/// A key found in `fragment` (the browser's `location.hash`) takes precedence
/// and is persisted; an explicit `api_key` is treated the same way. With
/// neither, the previously persisted key is reloaded.
#[utoipa::path(
    post,
    path = "/credential",
    request_body = CredentialRequest,
    responses(
        (status = 200, description = "Key connected", body = StatusResponse),
        (status = 401, description = "No key supplied and none persisted")
    )
)]
pub async fn connect_credential_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialRequest>,
) -> Result<Json<StatusResponse>, HandlerError> {
    let fragment = match (req.fragment, req.api_key) {
        (Some(fragment), _) if !fragment.trim().is_empty() => Some(fragment),
        (_, Some(key)) => ApiKey::new(key).map(|key| fragment_for(&key)),
        _ => None,
    };

    let key = acquire_credential(fragment.as_deref(), state.credential_store.as_ref())
        .ok_or((StatusCode::UNAUTHORIZED, "API Key Required".to_string()))?;
    *state.credential.write().await = Some(key);
    info!("API key connected.");

    let reader = state.reader.lock().await;
    Ok(Json(StatusResponse {
        connected: true,
        generating: reader.is_generating(),
        has_book: reader.book().is_some(),
    }))
}

/// Redirect the browser to the provider's authorization page. The provider
/// sends the user back to the public URL with `#api_key=...` appended.
#[utoipa::path(
    get,
    path = "/connect",
    responses((status = 303, description = "Redirect to the authorization page"))
)]
pub async fn connect_redirect_handler(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::to(&authorize_url(
        &state.config.authorize_url,
        &state.config.public_url,
        &[&state.config.image_model, &state.config.text_model],
    ))
}

pub(crate) fn authorize_url(authorize_base: &str, public_url: &str, models: &[&str]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect_url", public_url)
        .append_pair("models", &models.join(","))
        .append_pair("budget", "100")
        .append_pair("expiry", "30")
        .finish();
    format!("{authorize_base}?{query}")
}

/// Start generating a new book.
///
/// The generation runs in the background; follow it through `/progress` or
/// `/progress/ws`. Only one generation may run at a time.
#[utoipa::path(
    post,
    path = "/books",
    request_body = GenerateBookRequest,
    responses(
        (status = 202, description = "Generation started", body = GenerationAccepted),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "No API key connected"),
        (status = 409, description = "A generation is already running")
    )
)]
pub async fn generate_book_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateBookRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let request = req.into_story_request(&state)?;
    let credential = state.credential.read().await.clone();

    let credential = state
        .pipeline
        .begin(&state.reader, credential.as_ref())
        .await
        .map_err(|e| {
            let status = match e {
                GenerationError::MissingCredential => StatusCode::UNAUTHORIZED,
                GenerationError::GenerationInProgress => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!("Generation request rejected: {}", e);
            (status, e.user_message().to_string())
        })?;

    info!(pages = request.page_count, model = %request.text_model, "Generation started.");
    spawn_generation(state, request, credential);

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerationAccepted {
            message: "Generation started".to_string(),
        }),
    ))
}

/// Runs an admitted attempt in the background. If the attempt panics, the
/// in-flight flag is cleared and a failure is published so later requests
/// are not locked out.
fn spawn_generation(
    state: Arc<AppState>,
    request: StoryRequest,
    credential: ApiKey,
) -> JoinHandle<()> {
    let task_state = state.clone();
    let worker = tokio::spawn(async move {
        let pipeline = task_state.pipeline.clone();
        if let Err(e) = pipeline
            .execute(&task_state.reader, request, &credential, task_state.as_ref())
            .await
        {
            error!("Background generation failed: {}", e);
        }
    });

    tokio::spawn(async move {
        let Err(e) = worker.await else {
            return;
        };
        error!("Generation task aborted: {}", e);
        state.reader.lock().await.abort_generation();
        let failure = GenerationError::Transport("generation task aborted".to_string());
        state.report(Progress {
            percent: state.latest_progress().percent,
            stage: GenerationStage::Failed {
                reason: failure.to_string(),
            },
            label: "Generation failed".to_string(),
            detail: failure.user_message().to_string(),
        });
    })
}

/// The latest progress snapshot.
#[utoipa::path(
    get,
    path = "/progress",
    responses((status = 200, description = "Latest progress", body = ProgressResponse))
)]
pub async fn progress_handler(State(state): State<Arc<AppState>>) -> Json<ProgressResponse> {
    Json(state.latest_progress().into())
}

/// The active book and the page under the cursor.
#[utoipa::path(
    get,
    path = "/books/current",
    responses(
        (status = 200, description = "The active book", body = BookResponse),
        (status = 404, description = "No book generated yet")
    )
)]
pub async fn current_book_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BookResponse>, HandlerError> {
    let reader = state.reader.lock().await;
    book_response(&reader).map(Json)
}

/// Turn to the next page. A no-op on the last page.
#[utoipa::path(
    post,
    path = "/books/current/next",
    responses(
        (status = 200, description = "The book after navigating", body = BookResponse),
        (status = 404, description = "No book generated yet")
    )
)]
pub async fn next_page_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BookResponse>, HandlerError> {
    let mut reader = state.reader.lock().await;
    reader.next_page();
    book_response(&reader).map(Json)
}

/// Turn to the previous page. A no-op on the first page.
#[utoipa::path(
    post,
    path = "/books/current/prev",
    responses(
        (status = 200, description = "The book after navigating", body = BookResponse),
        (status = 404, description = "No book generated yet")
    )
)]
pub async fn prev_page_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BookResponse>, HandlerError> {
    let mut reader = state.reader.lock().await;
    reader.prev_page();
    book_response(&reader).map(Json)
}

/// Jump to a page by zero-based index. Out-of-range indexes are ignored.
#[utoipa::path(
    post,
    path = "/books/current/jump/{index}",
    params(("index" = usize, Path, description = "Zero-based page index")),
    responses(
        (status = 200, description = "The book after navigating", body = BookResponse),
        (status = 404, description = "No book generated yet")
    )
)]
pub async fn jump_to_page_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<BookResponse>, HandlerError> {
    let mut reader = state.reader.lock().await;
    reader.jump_to_page(index);
    book_response(&reader).map(Json)
}

/// Download the active book as a zip archive.
#[utoipa::path(
    get,
    path = "/books/current/archive",
    responses(
        (status = 200, description = "Zip archive", content_type = "application/zip"),
        (status = 404, description = "No book generated yet"),
        (status = 500, description = "Packaging failed")
    )
)]
pub async fn archive_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    // Snapshot the book so the reader lock is not held while images download.
    let book: Book = state
        .reader
        .lock()
        .await
        .book()
        .cloned()
        .ok_or((StatusCode::NOT_FOUND, "No book has been generated yet".to_string()))?;

    let bytes = state.archiver.archive(&book).await.map_err(|e| {
        error!("Failed to build archive: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to package the book".to_string(),
        )
    })?;

    let disposition = format!("attachment; filename=\"{}.zip\"", folder_name(&book.title));
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adapters::FileCredentialStore, config::Config};
    use async_trait::async_trait;
    use bytes::Bytes;
    use pollen_pages_core::{
        BookArchiver, ChatCompletionService, ChatRequest, CredentialStore, GenerationPipeline,
        ImageService, PipelineSettings, PortError, PortResult,
    };
    use std::collections::HashMap;

    struct OfflineChat;

    #[async_trait]
    impl ChatCompletionService for OfflineChat {
        async fn complete(&self, _: &ApiKey, _: &ChatRequest) -> PortResult<String> {
            Err(PortError::Transport("offline".into()))
        }
    }

    struct OfflineImages;

    #[async_trait]
    impl ImageService for OfflineImages {
        async fn fetch_image(&self, _: &str) -> PortResult<Bytes> {
            Err(PortError::Transport("offline".into()))
        }
    }

    struct PanickingChat;

    #[async_trait]
    impl ChatCompletionService for PanickingChat {
        async fn complete(&self, _: &ApiKey, _: &ChatRequest) -> PortResult<String> {
            panic!("chat backend blew up");
        }
    }

    fn test_state(dir: &tempfile::TempDir) -> Arc<AppState> {
        state_with_chat(dir, Arc::new(OfflineChat))
    }

    fn state_with_chat(
        dir: &tempfile::TempDir,
        chat: Arc<dyn ChatCompletionService>,
    ) -> Arc<AppState> {
        let config = Arc::new(Config::from_vars(&HashMap::new()).unwrap());
        let images: Arc<dyn ImageService> = Arc::new(OfflineImages);
        let pipeline = GenerationPipeline::new(
            chat,
            images.clone(),
            PipelineSettings {
                api_base: config.api_base.clone(),
                title_model: config.title_model.clone(),
            },
        );
        Arc::new(AppState::new(
            config,
            Arc::new(pipeline),
            Arc::new(BookArchiver::new(images)),
            Arc::new(FileCredentialStore::new(dir.path().join("key.json"))),
            None,
        ))
    }

    fn empty_request() -> GenerateBookRequest {
        serde_json::from_str("{}").unwrap()
    }

    #[tokio::test]
    async fn panicking_generation_releases_the_reader() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_chat(&dir, Arc::new(PanickingChat));
        let key = ApiKey::new("sk_test").unwrap();
        let credential = state.pipeline.begin(&state.reader, Some(&key)).await.unwrap();
        let request = empty_request().into_story_request(&state).unwrap();

        spawn_generation(state.clone(), request, credential).await.unwrap();

        assert!(!state.reader.lock().await.is_generating());
        assert!(matches!(
            state.latest_progress().stage,
            GenerationStage::Failed { .. }
        ));
        assert!(state.pipeline.begin(&state.reader, Some(&key)).await.is_ok());
    }

    #[tokio::test]
    async fn generation_requires_a_credential() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let result = generate_book_handler(State(state.clone()), Json(empty_request())).await;
        let Err((status, message)) = result else {
            panic!("generation without a key should be rejected");
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, GenerationError::MissingCredential.user_message());
        assert!(!state.reader.lock().await.is_generating());
    }

    #[tokio::test]
    async fn second_generation_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        *state.credential.write().await = ApiKey::new("sk_test");
        state.reader.lock().await.begin_generation().unwrap();

        let result = generate_book_handler(State(state), Json(empty_request())).await;
        assert!(matches!(result, Err((StatusCode::CONFLICT, _))));
    }

    #[tokio::test]
    async fn explicit_key_is_connected_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let req = CredentialRequest {
            fragment: None,
            api_key: Some("sk_manual".into()),
        };
        let Json(status) = connect_credential_handler(State(state.clone()), Json(req))
            .await
            .unwrap();
        assert!(status.connected);
        assert_eq!(
            state.credential.read().await.as_ref().map(ApiKey::expose),
            Some("sk_manual")
        );
        assert_eq!(state.credential_store.load().as_deref(), Some("sk_manual"));
    }

    #[tokio::test]
    async fn empty_credential_request_without_stored_key_is_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let req = CredentialRequest {
            fragment: Some("#other=1".into()),
            api_key: None,
        };
        let result = connect_credential_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err((StatusCode::UNAUTHORIZED, _))));
    }

    #[tokio::test]
    async fn navigation_without_a_book_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        assert!(matches!(
            next_page_handler(State(state.clone())).await,
            Err((StatusCode::NOT_FOUND, _))
        ));
        assert!(matches!(
            current_book_handler(State(state)).await,
            Err((StatusCode::NOT_FOUND, _))
        ));
    }

    #[test]
    fn invalid_dimensions_are_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut req = empty_request();
        req.dimensions = Some("wide".into());
        assert!(matches!(
            req.into_story_request(&state),
            Err((StatusCode::BAD_REQUEST, _))
        ));
    }

    #[test]
    fn authorize_url_carries_redirect_and_models() {
        let url = authorize_url(
            "https://enter.pollinations.ai/authorize",
            "http://localhost:3000/",
            &["zimage", "openai-fast"],
        );
        assert_eq!(
            url,
            "https://enter.pollinations.ai/authorize?redirect_url=http%3A%2F%2Flocalhost%3A3000%2F&models=zimage%2Copenai-fast&budget=100&expiry=30"
        );
    }

    #[test]
    fn generate_request_defaults() {
        let req: GenerateBookRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.genre, "fantasy");
        assert_eq!(req.pages, 5);
        assert!(req.title.is_empty());
        assert!(req.style.is_none());
    }
}
