//! # pulse-search
//!
//! Multi-provider retrieval and ranking engine for the Pulse news service.
//!
//! This crate fetches articles from several rate-limited news APIs with
//! automatic failover, serves semantic search over a vector index, and ranks
//! everything with one deterministic scoring function. The HTTP surface lives
//! in the `pulse` crate; this is the library it calls.
//!
//! ## Design
//!
//! - Providers sit behind the [`NewsProvider`] trait and are tried one at a
//!   time in priority order. A [`HealthTracker`] cools down providers that
//!   are rate limited or failing, and lets them back in once the cool-down
//!   has passed. A [`QuotaTracker`] skips providers whose daily allowance
//!   is used up.
//! - Responses are cached through a fail-open [`cache::FailOpenCache`]: a
//!   broken or slow backend costs latency, never correctness.
//! - Vector search over-fetches from the index with filters pushed into the
//!   query, then deduplicates by canonical URL and re-ranks by relevance,
//!   recency and engagement.
//!
//! ## Security
//!
//! - API keys and cache tokens are held in [`RedactedString`] and never logged
//! - Query text is logged only at trace level
//! - Error messages never carry upstream URLs (which may embed keys)

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod quota;
pub mod redact;
pub mod retrieval;
pub mod service;
pub mod types;

pub use config::EngineSettings;
pub use error::{AttemptOutcome, ProviderAttempt, Result, SearchError};
pub use health::{HealthConfig, HealthTracker, Outcome, ProviderState};
pub use orchestrator::{AssembledResult, FailoverOrchestrator, RankingParams};
pub use provider::{NewsProvider, ProviderFailure};
pub use quota::{QuotaSnapshot, QuotaTracker};
pub use redact::RedactedString;
pub use service::{
    HealthReport, NewsResponse, PulseService, PulseServiceBuilder, SearchRequest, SearchResponse,
    SearchV2Response,
};
pub use types::{Candidate, RankedResult, SearchFilters, Topic};
