//! services/studio/src/adapters/image_gen.rs
//!
//! This module contains the adapter for the image-generation endpoint.
//! It implements the `ImageService` port from the `core` crate.
//!
//! Image URLs carry the API key, so they are never logged and transport
//! errors are stripped of their URL before being surfaced.

use crate::adapters::chat_llm::map_transport_error;
use async_trait::async_trait;
use bytes::Bytes;
use pollen_pages_core::ports::{ImageService, PortError, PortResult};
use reqwest::Client;
use std::time::Duration;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ImageService` port with plain HTTP GETs.
#[derive(Clone)]
pub struct PollenImageAdapter {
    client: Client,
}

impl PollenImageAdapter {
    /// Creates a new `PollenImageAdapter` with an explicit per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

//=========================================================================================
// `ImageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ImageService for PollenImageAdapter {
    async fn fetch_image(&self, url: &str) -> PortResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Upstream {
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read image body: {}", e.without_url())))
    }
}
