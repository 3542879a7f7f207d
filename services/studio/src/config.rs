//! services/studio/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use pollen_pages_core::ApiKey;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub api_base: String,
    pub authorize_url: String,
    pub public_url: String,
    pub cors_origin: String,
    /// Overrides the persisted key at startup, like a key in the URL fragment.
    pub startup_api_key: Option<ApiKey>,
    pub credential_path: PathBuf,
    pub text_model: String,
    pub title_model: String,
    pub image_model: String,
    pub chat_timeout: Duration,
    pub image_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(&std::env::vars().collect())
    }

    /// Builds the configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str, default: &str| -> String {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        // --- Server Settings ---
        let bind_address_str = get("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = get("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let public_url = get("PUBLIC_URL", "http://localhost:3000/");
        let cors_origin = get("CORS_ORIGIN", "http://localhost:3000");

        // --- Generative API Settings ---
        let api_base = get("POLLEN_API_BASE", "https://gen.pollinations.ai")
            .trim_end_matches('/')
            .to_string();
        let authorize_url = get("POLLEN_AUTHORIZE_URL", "https://enter.pollinations.ai/authorize");
        for (name, value) in [
            ("POLLEN_API_BASE", &api_base),
            ("POLLEN_AUTHORIZE_URL", &authorize_url),
            ("PUBLIC_URL", &public_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
        }

        // --- Credential (optional) ---
        let startup_api_key = vars.get("POLLEN_API_KEY").and_then(|v| ApiKey::new(v.as_str()));
        let credential_path = PathBuf::from(get("CREDENTIAL_PATH", "./pollen_key.json"));

        // --- Model Settings ---
        let text_model = get("TEXT_MODEL", "openai");
        let title_model = get("TITLE_MODEL", "openai-fast");
        let image_model = get("IMAGE_MODEL", "zimage");

        let chat_timeout = parse_secs(&get("CHAT_TIMEOUT_SECS", "120"), "CHAT_TIMEOUT_SECS")?;
        let image_timeout = parse_secs(&get("IMAGE_TIMEOUT_SECS", "180"), "IMAGE_TIMEOUT_SECS")?;

        Ok(Self {
            bind_address,
            log_level,
            api_base,
            authorize_url,
            public_url,
            cors_origin,
            startup_api_key,
            credential_path,
            text_model,
            title_model,
            image_model,
            chat_timeout,
            image_timeout,
        })
    }
}

fn parse_secs(value: &str, name: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a positive number of seconds", value),
        )),
    }
}
