//! Uniform capability interface over heterogeneous news upstreams.
//!
//! Each upstream (GNews, NewsAPI, NewsData, Google News RSS) implements
//! [`NewsProvider`]. The orchestrator is polymorphic over this trait and
//! never branches on provider identity.

use std::time::Duration;

use async_trait::async_trait;

use crate::health::Outcome;
use crate::types::{Candidate, Topic};

/// Why a provider call produced no candidates.
///
/// A closed set, so the orchestrator's control flow is a plain match.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderFailure {
    #[error("provider timed out")]
    Timeout,
    #[error("provider rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("provider server error: {0}")]
    ServerError(String),
}

impl ProviderFailure {
    /// The health-tracker outcome this failure is recorded as.
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Timeout => Outcome::Timeout,
            Self::RateLimited { retry_after } => Outcome::RateLimited {
                retry_after: *retry_after,
            },
            Self::ServerError(_) => Outcome::ServerError,
        }
    }
}

/// A pluggable upstream news source.
///
/// Implementations own URL construction, authentication, response parsing
/// and mapping of HTTP status codes onto [`ProviderFailure`]. All
/// implementations must be `Send + Sync`; one instance serves every request.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Stable identifier used in logs, health reports and attempt logs.
    fn name(&self) -> &str;

    /// Fetch up to `limit` candidates for `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderFailure`] for timeouts, rate limiting, non-success
    /// statuses and malformed payloads.
    async fn fetch(&self, topic: &Topic, limit: usize) -> Result<Vec<Candidate>, ProviderFailure>;
}
