//! Query embedding client.
//!
//! Embedding generation lives in an external inference service; this side
//! only posts the query text and treats the returned vector as opaque.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    /// Embed `text` into the index's vector space.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::EmbeddingUnavailable`] when no vector can be produced.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Embedder calling `POST {url}` with `{"text": ...}` and reading
/// `{"embedding": [...]}`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self::new(crate::http::build_client(timeout)?, url))
    }
}

#[async_trait]
impl QueryEmbedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let unavailable = |msg: String| SearchError::EmbeddingUnavailable(msg);

        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(|e| unavailable(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status.as_u16())));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| unavailable(format!("malformed response: {}", e.without_url())))?;

        if body.embedding.is_empty() {
            return Err(unavailable("empty embedding".into()));
        }
        Ok(body.embedding)
    }
}

/// Embedder used when no inference service is configured.
pub struct UnconfiguredEmbedder;

#[async_trait]
impl QueryEmbedder for UnconfiguredEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, SearchError> {
        Err(SearchError::EmbeddingUnavailable(
            "no embedding service configured".into(),
        ))
    }
}
