//! Vector retrieval: metadata-filtered similarity search.
//!
//! [`VectorRetriever`] over-fetches `k × limit` candidates from a
//! [`VectorIndex`] so the ranking engine has room to re-order by recency and
//! engagement. Filters are pushed into the index query itself; nothing is
//! filtered after the fact. Unlike the cache this path is not fail-open:
//! there is no other source of search candidates.

pub mod embedder;
pub mod memory;
pub mod qdrant;

pub use embedder::{HttpEmbedder, QueryEmbedder, UnconfiguredEmbedder};
pub use memory::{IndexedDocument, InMemoryIndex};
pub use qdrant::QdrantIndex;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::{Candidate, SearchFilters};

/// Smallest allowed over-fetch multiplier.
pub const MIN_OVER_FETCH: usize = 3;

/// Upper bound on one index query, whatever the multiplier.
pub const MAX_FETCH: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index unreachable: {0}")]
    Unreachable(String),
    #[error("index query failed: {0}")]
    Query(String),
}

/// An external similarity index.
///
/// Implementations must apply every predicate in `filters` inside the index
/// query and return candidates with `distance` set (lower = closer).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    async fn query(
        &self,
        embedding: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Candidate>, IndexError>;
}

/// Over-fetching, time-bounded client over a [`VectorIndex`].
pub struct VectorRetriever {
    index: Arc<dyn VectorIndex>,
    over_fetch: usize,
    timeout: Duration,
}

impl VectorRetriever {
    /// `over_fetch` is raised to [`MIN_OVER_FETCH`] when smaller.
    pub fn new(index: Arc<dyn VectorIndex>, over_fetch: usize, timeout: Duration) -> Self {
        Self {
            index,
            over_fetch: over_fetch.max(MIN_OVER_FETCH),
            timeout,
        }
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    /// Number of candidates requested from the index for `limit` results.
    pub fn fetch_size(&self, limit: usize) -> usize {
        limit.saturating_mul(self.over_fetch).clamp(1, MAX_FETCH)
    }

    /// Query the index and return candidates by ascending distance.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::RetrievalIndexUnavailable`] if the index
    /// fails or does not answer within the timeout.
    pub async fn search(
        &self,
        embedding: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Candidate>, SearchError> {
        let fetch = self.fetch_size(limit);
        let started = std::time::Instant::now();

        let query = self.index.query(embedding, filters, fetch);
        let mut candidates = tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| {
                SearchError::RetrievalIndexUnavailable(format!(
                    "{} did not answer within {}ms",
                    self.index.name(),
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| SearchError::RetrievalIndexUnavailable(e.to_string()))?;

        candidates.sort_by(|a, b| {
            let da = a.distance.unwrap_or(f64::INFINITY);
            let db = b.distance.unwrap_or(f64::INFINITY);
            da.total_cmp(&db)
        });
        candidates.truncate(fetch);

        tracing::debug!(
            index = self.index.name(),
            requested = fetch,
            returned = candidates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector search complete"
        );
        Ok(candidates)
    }
}
