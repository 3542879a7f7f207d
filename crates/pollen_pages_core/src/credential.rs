//! crates/pollen_pages_core/src/credential.rs
//!
//! Credential acquisition: an `api_key` carried in a URL fragment overrides
//! and replaces whatever was persisted before.

use crate::{domain::ApiKey, ports::CredentialStore};
use tracing::{info, warn};

/// Name of the fragment parameter carrying the key.
pub const FRAGMENT_PARAM: &str = "api_key";

/// Extracts `api_key` from a fragment such as `#api_key=sk_...&foo=bar`.
pub fn key_from_fragment(fragment: &str) -> Option<ApiKey> {
    let fragment = fragment.trim().trim_start_matches('#');
    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(name, _)| name == FRAGMENT_PARAM)
        .and_then(|(_, value)| ApiKey::new(value.into_owned()))
}

/// Encodes a key as the fragment the authorization page would append.
pub fn fragment_for(key: &ApiKey) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair(FRAGMENT_PARAM, key.expose())
        .finish()
}

/// Resolves the active credential.
///
/// A key in `fragment` wins and is persisted immediately; otherwise the
/// persisted key, if any, is used. Persistence failures are logged and
/// otherwise ignored.
pub fn acquire_credential(fragment: Option<&str>, store: &dyn CredentialStore) -> Option<ApiKey> {
    if let Some(key) = fragment.and_then(key_from_fragment) {
        if store.save(key.expose()) {
            info!("API key acquired from fragment and persisted.");
        } else {
            warn!("API key acquired from fragment but could not be persisted.");
        }
        return Some(key);
    }
    store.load().and_then(ApiKey::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        value: Mutex<Option<String>>,
        broken: bool,
    }

    impl CredentialStore for MemoryStore {
        fn load(&self) -> Option<String> {
            if self.broken {
                return None;
            }
            self.value.lock().unwrap().clone()
        }

        fn save(&self, value: &str) -> bool {
            if self.broken {
                return false;
            }
            *self.value.lock().unwrap() = Some(value.to_string());
            true
        }
    }

    #[test]
    fn fragment_parsing() {
        assert_eq!(
            key_from_fragment("#api_key=sk_abc&x=1").unwrap().expose(),
            "sk_abc"
        );
        assert_eq!(key_from_fragment("x=1&api_key=sk%2Fabc").unwrap().expose(), "sk/abc");
        assert!(key_from_fragment("#x=1").is_none());
        assert!(key_from_fragment("#api_key=").is_none());
        assert!(key_from_fragment("").is_none());
    }

    #[test]
    fn fragment_overrides_and_persists() {
        let store = MemoryStore::default();
        store.save("old");
        let key = acquire_credential(Some("#api_key=new"), &store).unwrap();
        assert_eq!(key.expose(), "new");
        assert_eq!(store.load().as_deref(), Some("new"));
    }

    #[test]
    fn falls_back_to_persisted_key() {
        let store = MemoryStore::default();
        store.save("persisted");
        assert_eq!(acquire_credential(None, &store).unwrap().expose(), "persisted");
        assert_eq!(acquire_credential(Some("#other=1"), &store).unwrap().expose(), "persisted");
    }

    #[test]
    fn broken_store_is_not_fatal() {
        let store = MemoryStore {
            broken: true,
            ..Default::default()
        };
        assert!(acquire_credential(None, &store).is_none());
        assert_eq!(acquire_credential(Some("api_key=k"), &store).unwrap().expose(), "k");
    }

    #[test]
    fn encoded_fragment_reads_back() {
        let key = ApiKey::new("sk_a+b/c").unwrap();
        let fragment = fragment_for(&key);
        assert_eq!(key_from_fragment(&format!("#{fragment}")), Some(key));
    }
}
