//! services/api/src/adapters/embeddings.rs
//!
//! This module contains the adapter for the text-embedding endpoint.
//! It implements the `EmbeddingService` port from the `core` crate.
//!
//! Embeddings are best-effort: every failure path degrades to an empty
//! vector, which callers treat as "no embedding available".

use async_trait::async_trait;
use medstudy_core::ports::{EmbeddingService, PortResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `EmbeddingService` against an
/// OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct HttpEmbeddingAdapter {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbeddingAdapter {
    /// Creates a new `HttpEmbeddingAdapter`.
    pub fn new(api_base: String, api_key: Option<String>, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            api_key,
            model,
        }
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

//=========================================================================================
// `EmbeddingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmbeddingService for HttpEmbeddingAdapter {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        let url = format!("{}/embeddings", self.api_base.trim_end_matches('/'));
        let mut request = self.http.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("embedding request failed: {e}");
                return Ok(Vec::new());
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "embedding request rejected");
            return Ok(Vec::new());
        }

        match response.json::<EmbeddingResponse>().await {
            Ok(body) => Ok(body
                .data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .unwrap_or_default()),
            Err(e) => {
                warn!("malformed embedding response: {e}");
                Ok(Vec::new())
            }
        }
    }
}
