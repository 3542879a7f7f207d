//! services/studio/src/adapters/credential_file.rs
//!
//! A file-backed `CredentialStore`: a small JSON object holding the key under
//! `pollen_key`. Reads and writes are best-effort; any failure is logged and
//! reported as "nothing stored" or `false`.

use pollen_pages_core::ports::CredentialStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

#[derive(Serialize, Deserialize, Default)]
struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pollen_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<String> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredCredentials>(&raw) {
            Ok(stored) => stored.pollen_key.filter(|key| !key.trim().is_empty()),
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring unreadable credential file: {}", e);
                None
            }
        }
    }

    fn save(&self, value: &str) -> bool {
        let stored = StoredCredentials {
            pollen_key: Some(value.to_string()),
        };
        let result = serde_json::to_string(&stored)
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(&self.path, json));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), "Could not persist credential: {}", e);
                false
            }
        }
    }
}
