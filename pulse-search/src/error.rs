//! Error types for the pulse-search crate.
//!
//! Only the errors that reach a caller live here. Provider faults are
//! absorbed by the failover orchestrator (see [`crate::provider::ProviderFailure`])
//! and cache faults never leave the cache module. No API keys or query text
//! appear in error messages.

use serde::Serialize;

/// How a single provider fared during one orchestrated fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Not called: the provider was cooling down.
    Skipped,
    /// Not called: the provider's daily request quota is used up.
    QuotaExhausted,
    /// Answered without articles; the next provider was tried.
    Empty,
    Timeout,
    RateLimited,
    ServerError,
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Skipped => "skipped",
            Self::QuotaExhausted => "quota_exhausted",
            Self::Empty => "empty",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
        };
        f.write_str(label)
    }
}

/// One entry in the attempt log carried by [`SearchError::AllProvidersExhausted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
}

/// Errors surfaced by the retrieval and ranking pipelines.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Every provider was skipped or failed.
    #[error("all providers exhausted: {}", format_attempts(.attempts))]
    AllProvidersExhausted { attempts: Vec<ProviderAttempt> },

    /// The vector index could not be reached or rejected the query.
    #[error("retrieval index unavailable: {0}")]
    RetrievalIndexUnavailable(String),

    /// The query embedding service could not produce a vector.
    #[error("query embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The caller sent a request that violates a parameter constraint.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid engine configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllProvidersExhausted { .. } => "ALL_PROVIDERS_EXHAUSTED",
            Self::RetrievalIndexUnavailable(_) => "RETRIEVAL_INDEX_UNAVAILABLE",
            Self::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::Config(_) => "CONFIG_INVALID",
        }
    }

    /// Whether the caller may usefully retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AllProvidersExhausted { .. }
                | Self::RetrievalIndexUnavailable(_)
                | Self::EmbeddingUnavailable(_)
        )
    }
}

fn format_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no providers registered".to_owned();
    }
    attempts
        .iter()
        .map(|a| format!("{}={}", a.provider, a.outcome))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience type alias for pulse-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
