//! Service construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use pulse_search::cache::{FailOpenCache, MemoryBackend, RestBackend};
use pulse_search::http::build_client;
use pulse_search::providers::cloud_rss::DEFAULT_FEEDS;
use pulse_search::providers::{
    CloudRssProvider, GNewsProvider, GoogleRssProvider, NewsApiProvider, NewsDataProvider, gnews,
    google_rss, newsapi, newsdata,
};
use pulse_search::retrieval::{HttpEmbedder, InMemoryIndex, QdrantIndex};
use pulse_search::{NewsProvider, PulseService, RedactedString};

use crate::config::{CacheBackendKind, ProviderEntry, ServiceConfig};
use crate::error::{Result, ServiceError};

/// Build the engine described by `config`.
///
/// Providers are registered in priority order; key-based providers
/// without a key are left out. Each registered provider gets its daily
/// quota, and cloud feeds are registered unless disabled.
///
/// # Errors
///
/// Returns an error if an HTTP client or the index client cannot be built,
/// or the engine rejects the derived settings.
pub fn build_service(config: &ServiceConfig) -> Result<PulseService> {
    let settings = config.engine_settings();
    let client = build_client(settings.provider_timeout)?;

    let mut builder = PulseService::builder(settings);
    for name in &config.providers.priority {
        match build_provider(name, config, &client)? {
            Some(provider) => {
                let limit = daily_limit(name, config);
                tracing::info!(provider = %name, daily_limit = limit, "provider registered");
                builder = builder.provider(provider).daily_limit(name.clone(), limit);
            }
            None => tracing::warn!(provider = %name, "no API key configured, provider skipped"),
        }
    }

    if config.cloud_feeds.enabled {
        for feed in cloud_feeds(config, &client) {
            builder = builder.cloud_feed(feed);
        }
    }

    builder = builder.cache(build_cache(config)?);

    let index_timeout = Duration::from_secs(config.index.timeout_secs);
    builder = match &config.index.qdrant_url {
        Some(url) => {
            let index = QdrantIndex::new(url, config.index.collection.clone())
                .map_err(|e| ServiceError::Config(e.to_string()))?;
            tracing::info!(collection = %config.index.collection, "using Qdrant index");
            builder.index(Arc::new(index), index_timeout)
        }
        None => {
            tracing::warn!("no vector index configured, /search/v2 serves an empty index");
            builder.index(Arc::new(InMemoryIndex::new()), index_timeout)
        }
    };

    if let Some(url) = &config.embedder.url {
        let timeout = Duration::from_secs(config.embedder.timeout_secs);
        let embedder = HttpEmbedder::with_timeout(url.clone(), timeout)?;
        builder = builder.embedder(Arc::new(embedder));
    } else {
        tracing::warn!("no embedding service configured, /search/v2 will answer 503");
    }

    Ok(builder.build()?)
}

fn build_provider(
    name: &str,
    config: &ServiceConfig,
    client: &reqwest::Client,
) -> Result<Option<Arc<dyn NewsProvider>>> {
    let entry = config
        .providers
        .entry(name)
        .ok_or_else(|| ServiceError::Config(format!("unknown provider '{name}'")))?;
    let client = client.clone();

    let provider: Option<Arc<dyn NewsProvider>> = match name {
        "gnews" => api_key(entry).map(|key| {
            let base = base_url(entry, gnews::DEFAULT_BASE_URL);
            Arc::new(GNewsProvider::with_base_url(client, key, base)) as Arc<dyn NewsProvider>
        }),
        "newsapi" => api_key(entry).map(|key| {
            let base = base_url(entry, newsapi::DEFAULT_BASE_URL);
            Arc::new(NewsApiProvider::with_base_url(client, key, base)) as Arc<dyn NewsProvider>
        }),
        "newsdata" => api_key(entry).map(|key| {
            let base = base_url(entry, newsdata::DEFAULT_BASE_URL);
            Arc::new(NewsDataProvider::with_base_url(client, key, base)) as Arc<dyn NewsProvider>
        }),
        "google_rss" => {
            let base = base_url(entry, google_rss::DEFAULT_BASE_URL);
            Some(Arc::new(GoogleRssProvider::with_base_url(client, base)))
        }
        other => return Err(ServiceError::Config(format!("unknown provider '{other}'"))),
    };
    Ok(provider)
}

/// Configured allowance, or the provider's free-tier default.
fn daily_limit(name: &str, config: &ServiceConfig) -> u32 {
    let default = match name {
        "gnews" => gnews::DEFAULT_DAILY_LIMIT,
        "newsapi" => newsapi::DEFAULT_DAILY_LIMIT,
        "newsdata" => newsdata::DEFAULT_DAILY_LIMIT,
        _ => google_rss::DEFAULT_DAILY_LIMIT,
    };
    config
        .providers
        .entry(name)
        .and_then(|e| e.daily_limit)
        .unwrap_or(default)
}

/// Built-in feeds with configured URLs applied, then any extra vendors.
fn cloud_feeds(config: &ServiceConfig, client: &reqwest::Client) -> Vec<CloudRssProvider> {
    let overrides = &config.cloud_feeds.urls;
    let builtin = DEFAULT_FEEDS.iter().map(|(cloud, url)| {
        let url = overrides.get(*cloud).map_or(*url, String::as_str);
        CloudRssProvider::new(client.clone(), cloud, url)
    });
    let extra = overrides
        .iter()
        .filter(|(cloud, _)| !DEFAULT_FEEDS.iter().any(|(known, _)| known == cloud))
        .map(|(cloud, url)| CloudRssProvider::new(client.clone(), cloud, url.as_str()));
    builtin.chain(extra).collect()
}

fn api_key(entry: &ProviderEntry) -> Option<RedactedString> {
    entry.api_key.clone().filter(|k| !k.is_blank())
}

fn base_url(entry: &ProviderEntry, default: &str) -> String {
    entry.base_url.clone().unwrap_or_else(|| default.to_owned())
}

fn build_cache(config: &ServiceConfig) -> Result<FailOpenCache> {
    let op_timeout = Duration::from_millis(config.cache.op_timeout_ms);
    let cache = match config.cache.backend {
        CacheBackendKind::Memory => {
            let backend = MemoryBackend::new(config.cache.max_entries);
            FailOpenCache::new(Arc::new(backend), op_timeout)
        }
        CacheBackendKind::Rest => {
            let (Some(url), Some(token)) = (&config.cache.rest_url, &config.cache.rest_token) else {
                return Err(ServiceError::Config(
                    "rest cache backend needs rest_url and rest_token".into(),
                ));
            };
            let client = build_client(op_timeout)?;
            let backend = RestBackend::new(client, url.clone(), token.clone());
            FailOpenCache::new(Arc::new(backend), op_timeout)
        }
        CacheBackendKind::Disabled => FailOpenCache::disabled(),
    };
    tracing::info!(backend = cache.backend_name(), "response cache configured");
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keyless_providers_are_skipped() {
        let config = ServiceConfig::default();
        let service = build_service(&config).unwrap();
        assert_eq!(service.orchestrator().provider_names(), vec!["google_rss"]);
    }

    #[tokio::test]
    async fn keyed_providers_follow_priority() {
        let mut config = ServiceConfig::default();
        config.providers.priority = vec!["newsdata".into(), "google_rss".into(), "gnews".into()];
        config.providers.gnews.api_key = Some(RedactedString::new("g"));
        config.providers.newsdata.api_key = Some(RedactedString::new("n"));
        config.providers.newsapi.api_key = Some(RedactedString::new("unused"));

        let service = build_service(&config).unwrap();
        assert_eq!(
            service.orchestrator().provider_names(),
            vec!["newsdata", "google_rss", "gnews"]
        );
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let mut config = ServiceConfig::default();
        config.providers.gnews.api_key = Some(RedactedString::new("   "));
        let service = build_service(&config).unwrap();
        assert!(!service.orchestrator().provider_names().contains(&"gnews".to_owned()));
    }

    #[tokio::test]
    async fn daily_limits_default_per_provider() {
        let mut config = ServiceConfig::default();
        config.providers.gnews.api_key = Some(RedactedString::new("g"));
        config.providers.newsdata.api_key = Some(RedactedString::new("n"));
        config.providers.newsdata.daily_limit = Some(5);

        let service = build_service(&config).unwrap();
        let quotas = service.health().await.quotas;
        let limits: Vec<(&str, u32)> =
            quotas.iter().map(|q| (q.provider.as_str(), q.daily_limit)).collect();
        assert_eq!(limits, vec![("gnews", 100), ("newsdata", 5)]);
    }

    #[tokio::test]
    async fn cloud_feeds_registered_with_overrides() {
        let mut config = ServiceConfig::default();
        config
            .cloud_feeds
            .urls
            .insert("linode".into(), "https://feeds.example.com/linode".into());
        let service = build_service(&config).unwrap();
        let feeds = service.cloud_feeds();
        assert_eq!(feeds.len(), DEFAULT_FEEDS.len() + 1);
        assert_eq!(feeds[0], "aws");
        assert_eq!(feeds.last(), Some(&"linode"));

        config.cloud_feeds.enabled = false;
        assert!(build_service(&config).unwrap().cloud_feeds().is_empty());
    }

    #[tokio::test]
    async fn disabled_cache_reports_disabled() {
        let mut config = ServiceConfig::default();
        config.cache.backend = CacheBackendKind::Disabled;
        let service = build_service(&config).unwrap();
        assert_eq!(service.health().await.cache_backend, "disabled");
    }
}
