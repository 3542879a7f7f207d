//! services/studio/src/bin/pollen_pages.rs

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use pollen_pages_core::{
    acquire_credential, credential::fragment_for, ports::CredentialStore, BookArchiver,
    GenerationPipeline, PipelineSettings,
};
use std::sync::Arc;
use studio_lib::{
    adapters::{FileCredentialStore, PollenChatAdapter, PollenImageAdapter},
    config::{Config, ConfigError},
    error::ApiError,
    web::{
        rest::{
            archive_handler, connect_credential_handler, connect_redirect_handler,
            current_book_handler, generate_book_handler, jump_to_page_handler, next_page_handler,
            prev_page_handler, progress_handler, status_handler, ApiDoc,
        },
        state::AppState,
        ws_handler,
    },
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let chat_adapter = Arc::new(PollenChatAdapter::new(&config.api_base, config.chat_timeout)?);
    let image_adapter = Arc::new(PollenImageAdapter::new(config.image_timeout)?);
    let credential_store: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(config.credential_path.clone()));

    // A key given in the environment behaves like one arriving in the URL
    // fragment: it wins over the persisted key and replaces it.
    let startup_fragment = config.startup_api_key.as_ref().map(fragment_for);
    let credential = acquire_credential(startup_fragment.as_deref(), credential_store.as_ref());
    if credential.is_none() {
        warn!("No API key connected yet. Visit /connect or POST /credential.");
    }

    // --- 3. Build the Generation Pipeline & Shared AppState ---
    let pipeline = Arc::new(GenerationPipeline::new(
        chat_adapter,
        image_adapter.clone(),
        PipelineSettings {
            api_base: config.api_base.clone(),
            title_model: config.title_model.clone(),
        },
    ));
    let archiver = Arc::new(BookArchiver::new(image_adapter));

    let app_state = Arc::new(AppState::new(
        config.clone(),
        pipeline,
        archiver,
        credential_store,
        credential,
    ));

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 4. Create the Web Router ---
    let api_router = Router::new()
        .route("/status", get(status_handler))
        .route("/credential", post(connect_credential_handler))
        .route("/connect", get(connect_redirect_handler))
        .route("/books", post(generate_book_handler))
        .route("/progress", get(progress_handler))
        .route("/progress/ws", get(ws_handler))
        .route("/books/current", get(current_book_handler))
        .route("/books/current/next", post(next_page_handler))
        .route("/books/current/prev", post(prev_page_handler))
        .route("/books/current/jump/{index}", post(jump_to_page_handler))
        .route("/books/current/archive", get(archive_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
