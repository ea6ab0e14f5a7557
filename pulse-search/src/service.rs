//! Request pipelines: category news, cloud vendor feeds, baseline search,
//! vector search, health.
//!
//! [`PulseService`] owns one instance of every engine component and is shared
//! across requests behind an `Arc`. Each pipeline reads the cache first,
//! does the upstream work on a miss, and writes the assembled response back
//! with its TTL. A response is either fully ranked or an error.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, CacheStats, CacheStatus, FailOpenCache};
use crate::config::{EngineSettings, DEFAULT_LIMIT, MAX_LIMIT};
use crate::error::{Result, SearchError};
use crate::health::{HealthTracker, ProviderSnapshot};
use crate::orchestrator::{
    assemble, dedupe, rank, AssembledResult, FailoverOrchestrator, FailoverStats,
};
use crate::provider::NewsProvider;
use crate::providers::cloud_rss::{CloudRssProvider, FEED_LIMIT};
use crate::quota::{QuotaSnapshot, QuotaTracker};
use crate::retrieval::{
    InMemoryIndex, QueryEmbedder, UnconfiguredEmbedder, VectorIndex, VectorRetriever,
};
use crate::types::{SearchFilters, Topic};

pub const MIN_QUERY_CHARS: usize = 2;
pub const MAX_QUERY_CHARS: usize = 200;
pub const MAX_CATEGORY_CHARS: usize = 64;
/// One week.
pub const MAX_HOURS: u32 = 168;

const DEFAULT_INDEX_TIMEOUT: Duration = Duration::from_secs(5);

/// `GET /news/{category}` and `GET /news/rss/{provider}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsResponse {
    pub success: bool,
    pub category: String,
    pub provider: String,
    pub cache_hit: bool,
    pub count: usize,
    pub articles: Vec<AssembledResult>,
}

/// `GET /search` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub query: String,
    pub provider: String,
    pub cache_hit: bool,
    pub count: usize,
    pub results: Vec<AssembledResult>,
}

/// Parameters of a vector search, before validation.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub q: String,
    pub category: Option<String>,
    /// Cloud provider filter (`aws`, `gcp`, ...).
    pub provider: Option<String>,
    pub limit: Option<usize>,
    pub max_hours: Option<u32>,
    pub decay_factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiltersApplied {
    pub category: Option<String>,
    pub cloud_provider: Option<String>,
    pub max_hours: Option<u32>,
    pub decay_factor: f64,
}

/// `GET /search/v2` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchV2Response {
    pub success: bool,
    pub query: String,
    pub count: usize,
    pub cache_hit: bool,
    pub processing_time_ms: u64,
    pub filters_applied: FiltersApplied,
    pub results: Vec<AssembledResult>,
}

/// `GET /health` payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `ok` while at least one provider is eligible, `degraded` otherwise.
    pub status: &'static str,
    /// News providers in priority order. `eligible` is false while a
    /// provider is cooling down or out of daily quota.
    pub providers: Vec<ProviderSnapshot>,
    /// Daily quota usage of providers that have a limit.
    pub quotas: Vec<QuotaSnapshot>,
    /// Cloud vendor feeds; these do not affect `status`.
    pub cloud_feeds: Vec<ProviderSnapshot>,
    pub cache: CacheStatus,
    pub cache_backend: &'static str,
    pub cache_stats: CacheStats,
    pub stats: FailoverStats,
}

/// Assembles a [`PulseService`]. Unset parts default to a disabled cache,
/// an empty in-memory index and an embedder that always fails.
pub struct PulseServiceBuilder {
    settings: EngineSettings,
    providers: Vec<Arc<dyn NewsProvider>>,
    cache: Option<FailOpenCache>,
    index: Option<(Arc<dyn VectorIndex>, Duration)>,
    embedder: Option<Arc<dyn QueryEmbedder>>,
    daily_limits: Vec<(String, u32)>,
    cloud_feeds: Vec<CloudRssProvider>,
}

impl PulseServiceBuilder {
    /// Append a provider; call order is priority order.
    pub fn provider(mut self, provider: Arc<dyn NewsProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn cache(mut self, cache: FailOpenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn index(mut self, index: Arc<dyn VectorIndex>, timeout: Duration) -> Self {
        self.index = Some((index, timeout));
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn QueryEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Cap calls to `provider` per day; 0 means unlimited.
    pub fn daily_limit(mut self, provider: impl Into<String>, limit: u32) -> Self {
        self.daily_limits.push((provider.into(), limit));
        self
    }

    /// Serve a cloud vendor feed. A later feed for the same vendor replaces
    /// the earlier one.
    pub fn cloud_feed(mut self, feed: CloudRssProvider) -> Self {
        self.cloud_feeds.retain(|f| f.cloud() != feed.cloud());
        self.cloud_feeds.push(feed);
        self
    }

    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the settings are invalid.
    pub fn build(self) -> Result<PulseService> {
        self.settings.validate()?;

        let names: Vec<String> = self.providers.iter().map(|p| p.name().to_owned()).collect();
        let tracker = Arc::new(HealthTracker::new(self.settings.health.clone(), names));
        let quota = Arc::new(QuotaTracker::new(self.daily_limits));
        let orchestrator =
            FailoverOrchestrator::new(self.providers, tracker, self.settings.provider_timeout)
                .with_quota(quota);

        // Each feed gets its own tracker so one vendor's outage never
        // cools down another's.
        let cloud_feeds = self
            .cloud_feeds
            .into_iter()
            .map(|feed| {
                let cloud = feed.cloud().to_owned();
                let tracker = Arc::new(HealthTracker::new(
                    self.settings.health.clone(),
                    [feed.name().to_owned()],
                ));
                let feed: Arc<dyn NewsProvider> = Arc::new(feed);
                let orchestrator =
                    FailoverOrchestrator::new(vec![feed], tracker, self.settings.provider_timeout);
                (cloud, orchestrator)
            })
            .collect();

        let (index, index_timeout) = self
            .index
            .unwrap_or_else(|| (Arc::new(InMemoryIndex::new()), DEFAULT_INDEX_TIMEOUT));
        let retriever = VectorRetriever::new(index, self.settings.over_fetch, index_timeout);

        Ok(PulseService {
            orchestrator,
            cloud_feeds,
            cache: self.cache.unwrap_or_else(FailOpenCache::disabled),
            retriever,
            embedder: self.embedder.unwrap_or_else(|| Arc::new(UnconfiguredEmbedder)),
            settings: self.settings,
        })
    }
}

pub struct PulseService {
    orchestrator: FailoverOrchestrator,
    cloud_feeds: Vec<(String, FailoverOrchestrator)>,
    cache: FailOpenCache,
    retriever: VectorRetriever,
    embedder: Arc<dyn QueryEmbedder>,
    settings: EngineSettings,
}

impl PulseService {
    pub fn builder(settings: EngineSettings) -> PulseServiceBuilder {
        PulseServiceBuilder {
            settings,
            providers: Vec::new(),
            cache: None,
            index: None,
            embedder: None,
            daily_limits: Vec::new(),
            cloud_feeds: Vec::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn orchestrator(&self) -> &FailoverOrchestrator {
        &self.orchestrator
    }

    /// Vendor slugs with a configured feed.
    pub fn cloud_feeds(&self) -> Vec<&str> {
        self.cloud_feeds.iter().map(|(cloud, _)| cloud.as_str()).collect()
    }

    /// Latest articles for a category, via provider failover.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidQuery`] for a malformed slug,
    /// [`SearchError::AllProvidersExhausted`] when no provider answers.
    pub async fn news(&self, category: &str) -> Result<NewsResponse> {
        let category = validate_category(category)?;
        let key = CacheKey::builder("news").text("category", &category).build();

        if let Some(mut cached) = self.cache.get_json::<NewsResponse>(&key).await {
            cached.cache_hit = true;
            return Ok(cached);
        }

        let outcome = self
            .orchestrator
            .fetch(&Topic::Category(category.clone()), DEFAULT_LIMIT)
            .await?;
        let now = Utc::now();
        let ranked = rank(dedupe(outcome.candidates), now, self.settings.ranking);
        let articles = assemble(ranked, DEFAULT_LIMIT, now);

        let response = NewsResponse {
            success: true,
            category,
            provider: outcome.provider,
            cache_hit: false,
            count: articles.len(),
            articles,
        };
        self.cache.set_json(&key, &response, self.settings.news_ttl).await;
        Ok(response)
    }

    /// Latest posts from one cloud vendor's blog feed.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidQuery`] for a vendor without a feed,
    /// [`SearchError::AllProvidersExhausted`] when the feed cannot be read.
    pub async fn cloud_news(&self, cloud: &str) -> Result<NewsResponse> {
        let cloud = cloud.trim().to_lowercase();
        let Some((_, feed)) = self.cloud_feeds.iter().find(|(c, _)| *c == cloud) else {
            return Err(SearchError::InvalidQuery(format!(
                "provider must be one of: {}",
                self.cloud_feeds().join(", ")
            )));
        };
        let key = CacheKey::builder("rss").text("provider", &cloud).build();

        if let Some(mut cached) = self.cache.get_json::<NewsResponse>(&key).await {
            cached.cache_hit = true;
            return Ok(cached);
        }

        let category = format!("cloud-{cloud}");
        let outcome = feed.fetch(&Topic::Category(category.clone()), FEED_LIMIT).await?;
        let now = Utc::now();
        let ranked = rank(dedupe(outcome.candidates), now, self.settings.ranking);
        let articles = assemble(ranked, FEED_LIMIT, now);

        let response = NewsResponse {
            success: true,
            category,
            provider: outcome.provider,
            cache_hit: false,
            count: articles.len(),
            articles,
        };
        self.cache.set_json(&key, &response, self.settings.news_ttl).await;
        Ok(response)
    }

    /// Baseline free-text search through the provider chain.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidQuery`] for a bad query or limit,
    /// [`SearchError::AllProvidersExhausted`] when no provider answers.
    pub async fn search(&self, q: &str, limit: Option<usize>) -> Result<SearchResponse> {
        let query = validate_query(q)?;
        let limit = validate_limit(limit)?;
        let key = CacheKey::builder("search")
            .text("q", &query)
            .number("limit", limit as u64)
            .build();

        // Keys fold case, so a hit may come from a differently cased query.
        if let Some(mut cached) = self.cache.get_json::<SearchResponse>(&key).await {
            cached.query = query;
            cached.cache_hit = true;
            return Ok(cached);
        }

        tracing::trace!(query = %query, "baseline search");
        let outcome = self.orchestrator.fetch(&Topic::Query(query.clone()), limit).await?;
        let now = Utc::now();
        let ranked = rank(dedupe(outcome.candidates), now, self.settings.ranking);
        let results = assemble(ranked, limit, now);

        let response = SearchResponse {
            success: true,
            query,
            provider: outcome.provider,
            cache_hit: false,
            count: results.len(),
            results,
        };
        self.cache.set_json(&key, &response, self.settings.search_ttl).await;
        Ok(response)
    }

    /// Semantic search: embed, retrieve with filters, dedupe, rank, trim.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidQuery`] for out-of-range parameters,
    /// [`SearchError::EmbeddingUnavailable`] or
    /// [`SearchError::RetrievalIndexUnavailable`] when a backing service fails.
    pub async fn search_v2(&self, request: SearchRequest) -> Result<SearchV2Response> {
        let started = std::time::Instant::now();

        let query = validate_query(&request.q)?;
        let limit = validate_limit(request.limit)?;
        let max_hours = validate_max_hours(request.max_hours)?;
        let category = non_blank(request.category)
            .map(|c| validate_category(&c))
            .transpose()?;
        let cloud_provider = non_blank(request.provider).map(|p| p.to_lowercase());
        let params = match request.decay_factor {
            Some(decay) => self.settings.ranking.with_decay(decay),
            None => self.settings.ranking,
        };

        let key = CacheKey::builder("search:v2")
            .text("q", &query)
            .opt_text("category", category.as_deref())
            .opt_text("provider", cloud_provider.as_deref())
            .number("limit", limit as u64)
            .number("max_hours", max_hours.map_or(0, u64::from))
            .float("decay_factor", params.decay_factor())
            .build();

        if let Some(mut cached) = self.cache.get_json::<SearchV2Response>(&key).await {
            cached.query = query;
            cached.cache_hit = true;
            cached.processing_time_ms = elapsed_ms(started);
            return Ok(cached);
        }

        let now = Utc::now();
        let filters = SearchFilters {
            category: category.clone(),
            cloud_provider: cloud_provider.clone(),
            published_after: max_hours.map(|h| now - chrono::Duration::hours(i64::from(h))),
            ..Default::default()
        };

        tracing::trace!(query = %query, "vector search");
        let embedding = self.embedder.embed(&query).await?;
        let candidates = self.retriever.search(&embedding, &filters, limit).await?;
        let ranked = rank(dedupe(candidates), now, params);
        let results = assemble(ranked, limit, now);

        let response = SearchV2Response {
            success: true,
            query,
            count: results.len(),
            cache_hit: false,
            processing_time_ms: elapsed_ms(started),
            filters_applied: FiltersApplied {
                category,
                cloud_provider,
                max_hours,
                decay_factor: params.decay_factor(),
            },
            results,
        };
        self.cache.set_json(&key, &response, self.settings.search_ttl).await;
        tracing::debug!(
            index = self.retriever.index_name(),
            count = response.count,
            elapsed_ms = response.processing_time_ms,
            "vector search served"
        );
        Ok(response)
    }

    pub async fn health(&self) -> HealthReport {
        let now = tokio::time::Instant::now();
        let quota = self.orchestrator.quota();
        let mut providers = self.orchestrator.tracker().snapshot(now);
        for provider in &mut providers {
            provider.eligible &= quota.has_quota(&provider.name, now);
        }
        let status = if providers.iter().any(|p| p.eligible) {
            "ok"
        } else {
            "degraded"
        };
        let cloud_feeds = self
            .cloud_feeds
            .iter()
            .flat_map(|(_, feed)| feed.tracker().snapshot(now))
            .collect();
        HealthReport {
            status,
            providers,
            quotas: quota.snapshot(now),
            cloud_feeds,
            cache: self.cache.status().await,
            cache_backend: self.cache.backend_name(),
            cache_stats: self.cache.stats(),
            stats: self.orchestrator.stats(),
        }
    }
}

fn elapsed_ms(started: std::time::Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Trim `q` and check its length in characters.
pub fn validate_query(q: &str) -> Result<String> {
    let trimmed = q.trim();
    let chars = trimmed.chars().count();
    if chars < MIN_QUERY_CHARS {
        return Err(SearchError::InvalidQuery(format!(
            "q must be at least {MIN_QUERY_CHARS} characters"
        )));
    }
    if chars > MAX_QUERY_CHARS {
        return Err(SearchError::InvalidQuery(format!(
            "q must be at most {MAX_QUERY_CHARS} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

pub fn validate_limit(limit: Option<usize>) -> Result<usize> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
        Some(_) => Err(SearchError::InvalidQuery(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        ))),
    }
}

pub fn validate_max_hours(max_hours: Option<u32>) -> Result<Option<u32>> {
    match max_hours {
        Some(h) if !(1..=MAX_HOURS).contains(&h) => Err(SearchError::InvalidQuery(format!(
            "max_hours must be between 1 and {MAX_HOURS}"
        ))),
        other => Ok(other),
    }
}

/// Lowercase a category slug and check it is `[a-z0-9-]{1,64}`.
pub fn validate_category(category: &str) -> Result<String> {
    let slug = category.trim().to_lowercase();
    let well_formed = !slug.is_empty()
        && slug.len() <= MAX_CATEGORY_CHARS
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !well_formed {
        return Err(SearchError::InvalidQuery(format!(
            "category must be 1-{MAX_CATEGORY_CHARS} characters of a-z, 0-9 or '-'"
        )));
    }
    Ok(slug)
}
