//! Brute-force in-process [`VectorIndex`] for local runs and tests.
//!
//! Applies the same predicates as the Qdrant index, then ranks by cosine
//! distance.

use std::sync::RwLock;

use async_trait::async_trait;

use super::{IndexError, VectorIndex};
use crate::types::{Candidate, SearchFilters};

/// A stored document: embedding plus the candidate, whose metadata is
/// what the filters match against.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub embedding: Vec<f32>,
    pub candidate: Candidate,
}

impl IndexedDocument {
    pub fn new(embedding: Vec<f32>, candidate: Candidate) -> Self {
        Self {
            embedding,
            candidate,
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.candidate = self.candidate.with_tags(tags);
        self
    }

    pub fn with_cloud_provider(mut self, provider: &str) -> Self {
        self.candidate = self.candidate.with_cloud_provider(provider);
        self
    }

    fn matches(&self, filters: &SearchFilters) -> bool {
        let c = &self.candidate;
        filters.category.as_ref().is_none_or(|cat| *cat == c.category)
            && filters.source.as_ref().is_none_or(|src| *src == c.source)
            && filters
                .cloud_provider
                .as_ref()
                .is_none_or(|p| c.is_cloud_news && c.cloud_provider.as_ref() == Some(p))
            && filters.tags.iter().all(|t| c.tags.contains(t))
            && filters.published_after.is_none_or(|after| c.published_at >= after)
    }
}

#[derive(Default)]
pub struct InMemoryIndex {
    documents: RwLock<Vec<IndexedDocument>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document by candidate id.
    pub fn upsert(&self, document: IndexedDocument) {
        let mut docs = self.documents.write().unwrap_or_else(|p| p.into_inner());
        match docs.iter_mut().find(|d| d.candidate.id == document.candidate.id) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().map_or(0, |d| d.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(
        &self,
        embedding: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Candidate>, IndexError> {
        let docs = self
            .documents
            .read()
            .map_err(|_| IndexError::Unreachable("index lock poisoned".into()))?;

        let mut hits: Vec<(f64, &IndexedDocument)> = docs
            .iter()
            .filter(|d| d.matches(filters))
            .map(|d| (cosine_distance(embedding, &d.embedding), d))
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(hits
            .into_iter()
            .take(limit)
            .map(|(distance, d)| d.candidate.clone().with_distance(distance))
            .collect())
    }
}

/// `1 - cos(a, b)`; mismatched or zero vectors are maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 2.0;
    }
    (1.0 - dot / (na.sqrt() * nb.sqrt())).max(0.0)
}
