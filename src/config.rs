//! Configuration types for the Pulse service.
//!
//! Load order is defaults, then an optional TOML file named by
//! `PULSE_CONFIG`, then environment overrides. [`ServiceConfig::validate`]
//! runs last and rejects settings the engine cannot run with.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use pulse_search::health::HealthConfig;
use pulse_search::{EngineSettings, RankingParams, RedactedString};
use serde::Deserialize;

use crate::error::{Result, ServiceError};

/// Provider names the service knows how to build.
pub const KNOWN_PROVIDERS: &[&str] = &["gnews", "newsapi", "newsdata", "google_rss"];

/// Longest cool-down the health policy may ask for.
pub const MAX_BACKOFF_CAP_SECS: u64 = 86_400;

/// Top-level configuration for the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener settings.
    pub server: ServerConfig,
    /// Upstream providers, priority order and credentials.
    pub providers: ProvidersConfig,
    /// Cool-down policy for failing providers.
    pub health: HealthSettings,
    /// Response cache backend and lifetimes.
    pub cache: CacheConfig,
    /// Default ranking factors and index over-fetch.
    pub ranking: RankingConfig,
    /// Vector index connection.
    pub index: IndexConfig,
    /// Query embedding service.
    pub embedder: EmbedderConfig,
    /// Cloud vendor blog feeds behind `/news/rss/{provider}`.
    pub cloud_feeds: CloudFeedsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// Credentials and endpoint override for one provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderEntry {
    /// Providers that need a key are not registered without one.
    pub api_key: Option<RedactedString>,
    /// Replaces the upstream's public base URL.
    pub base_url: Option<String>,
    /// Calls allowed per day; unset uses the provider's free-tier
    /// allowance, 0 means unlimited.
    pub daily_limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider names, most preferred first.
    pub priority: Vec<String>,
    /// Bound on a single provider call.
    pub timeout_secs: u64,
    pub gnews: ProviderEntry,
    pub newsapi: ProviderEntry,
    pub newsdata: ProviderEntry,
    pub google_rss: ProviderEntry,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            priority: KNOWN_PROVIDERS.iter().map(|p| (*p).to_owned()).collect(),
            timeout_secs: 10,
            gnews: ProviderEntry::default(),
            newsapi: ProviderEntry::default(),
            newsdata: ProviderEntry::default(),
            google_rss: ProviderEntry::default(),
        }
    }
}

impl ProvidersConfig {
    /// The entry for a provider name, if it is a known provider.
    pub fn entry(&self, name: &str) -> Option<&ProviderEntry> {
        match name {
            "gnews" => Some(&self.gnews),
            "newsapi" => Some(&self.newsapi),
            "newsdata" => Some(&self.newsdata),
            "google_rss" => Some(&self.google_rss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Consecutive failures before a provider cools down.
    pub failure_threshold: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            backoff_base_secs: 30,
            backoff_cap_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    /// In-process, bounded.
    #[default]
    Memory,
    /// Redis over REST (Upstash wire format).
    Rest,
    Disabled,
}

impl std::str::FromStr for CacheBackendKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rest" => Ok(Self::Rest),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(ServiceError::Config(format!("unknown cache backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Lifetime of `/news/{category}` responses.
    pub news_ttl_secs: u64,
    /// Lifetime of search responses.
    pub search_ttl_secs: u64,
    /// Bound on any single cache round-trip.
    pub op_timeout_ms: u64,
    /// Capacity of the in-process backend.
    pub max_entries: u64,
    pub rest_url: Option<String>,
    pub rest_token: Option<RedactedString>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            news_ttl_secs: 120,
            search_ttl_secs: 300,
            op_timeout_ms: 250,
            max_entries: 10_000,
            rest_url: None,
            rest_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Default recency decay, overridable per request.
    pub decay_factor: f64,
    pub boost_factor: f64,
    /// Index over-fetch multiplier.
    pub over_fetch: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.1,
            boost_factor: 0.05,
            over_fetch: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Qdrant gRPC endpoint. Without one an empty in-memory index is used.
    pub qdrant_url: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            qdrant_url: None,
            collection: "articles".to_owned(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// `POST` endpoint returning `{"embedding": [...]}`.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudFeedsConfig {
    pub enabled: bool,
    /// Feed URL per vendor slug. Replaces a built-in feed or adds a new one.
    pub urls: BTreeMap<String, String>,
}

impl Default for CloudFeedsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            urls: BTreeMap::new(),
        }
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 5,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Defaults, then `PULSE_CONFIG` (if set), then the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded, an override does not
    /// parse, or the result fails [`validate`](Self::validate).
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os("PULSE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] naming the variable that does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(v) = get("PULSE_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PULSE_PORT") {
            self.server.port = parse_var("PULSE_PORT", &v)?;
        }

        if let Some(v) = get("PULSE_PROVIDER_PRIORITY") {
            self.providers.priority = v
                .split(',')
                .map(|p| p.trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(v) = get("PULSE_PROVIDER_TIMEOUT_SECS") {
            self.providers.timeout_secs = parse_var("PULSE_PROVIDER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("GNEWS_API_KEY") {
            self.providers.gnews.api_key = Some(RedactedString::new(v));
        }
        if let Some(v) = get("NEWSAPI_API_KEY") {
            self.providers.newsapi.api_key = Some(RedactedString::new(v));
        }
        if let Some(v) = get("NEWSDATA_API_KEY") {
            self.providers.newsdata.api_key = Some(RedactedString::new(v));
        }
        if let Some(v) = get("GNEWS_DAILY_LIMIT") {
            self.providers.gnews.daily_limit = Some(parse_var("GNEWS_DAILY_LIMIT", &v)?);
        }
        if let Some(v) = get("NEWSAPI_DAILY_LIMIT") {
            self.providers.newsapi.daily_limit = Some(parse_var("NEWSAPI_DAILY_LIMIT", &v)?);
        }
        if let Some(v) = get("NEWSDATA_DAILY_LIMIT") {
            self.providers.newsdata.daily_limit = Some(parse_var("NEWSDATA_DAILY_LIMIT", &v)?);
        }

        if let Some(v) = get("PULSE_FAILURE_THRESHOLD") {
            self.health.failure_threshold = parse_var("PULSE_FAILURE_THRESHOLD", &v)?;
        }
        if let Some(v) = get("PULSE_BACKOFF_BASE_SECS") {
            self.health.backoff_base_secs = parse_var("PULSE_BACKOFF_BASE_SECS", &v)?;
        }
        if let Some(v) = get("PULSE_BACKOFF_CAP_SECS") {
            self.health.backoff_cap_secs = parse_var("PULSE_BACKOFF_CAP_SECS", &v)?;
        }

        if let Some(v) = get("PULSE_CACHE_BACKEND") {
            self.cache.backend = v.parse()?;
        }
        if let Some(v) = get("PULSE_NEWS_CACHE_TTL_SECS") {
            self.cache.news_ttl_secs = parse_var("PULSE_NEWS_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = get("PULSE_SEARCH_CACHE_TTL_SECS") {
            self.cache.search_ttl_secs = parse_var("PULSE_SEARCH_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = get("PULSE_CACHE_REST_URL") {
            self.cache.rest_url = Some(v);
        }
        if let Some(v) = get("PULSE_CACHE_REST_TOKEN") {
            self.cache.rest_token = Some(RedactedString::new(v));
        }

        if let Some(v) = get("PULSE_DECAY_FACTOR") {
            self.ranking.decay_factor = parse_var("PULSE_DECAY_FACTOR", &v)?;
        }
        if let Some(v) = get("PULSE_BOOST_FACTOR") {
            self.ranking.boost_factor = parse_var("PULSE_BOOST_FACTOR", &v)?;
        }
        if let Some(v) = get("PULSE_OVER_FETCH") {
            self.ranking.over_fetch = parse_var("PULSE_OVER_FETCH", &v)?;
        }

        if let Some(v) = get("PULSE_QDRANT_URL") {
            self.index.qdrant_url = Some(v);
        }
        if let Some(v) = get("PULSE_QDRANT_COLLECTION") {
            self.index.collection = v;
        }
        if let Some(v) = get("PULSE_EMBEDDER_URL") {
            self.embedder.url = Some(v);
        }
        if let Some(v) = get("PULSE_CLOUD_FEEDS") {
            self.cloud_feeds.enabled = parse_var("PULSE_CLOUD_FEEDS", &v)?;
        }
        Ok(())
    }

    /// Validates this configuration, returning an error naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ServiceError::Config(msg));

        if self.providers.priority.is_empty() {
            return invalid("providers.priority must name at least one provider".into());
        }
        for (i, name) in self.providers.priority.iter().enumerate() {
            if !KNOWN_PROVIDERS.contains(&name.as_str()) {
                return invalid(format!(
                    "providers.priority: unknown provider '{name}' (known: {})",
                    KNOWN_PROVIDERS.join(", ")
                ));
            }
            if self.providers.priority[..i].contains(name) {
                return invalid(format!("providers.priority: '{name}' listed twice"));
            }
        }
        if self.providers.timeout_secs == 0 {
            return invalid("providers.timeout_secs must be greater than 0".into());
        }
        if self.health.failure_threshold == 0 {
            return invalid("health.failure_threshold must be at least 1".into());
        }
        if self.health.backoff_base_secs == 0 {
            return invalid("health.backoff_base_secs must be greater than 0".into());
        }
        if self.health.backoff_base_secs > self.health.backoff_cap_secs {
            return invalid("health.backoff_base_secs must be <= health.backoff_cap_secs".into());
        }
        if self.health.backoff_cap_secs > MAX_BACKOFF_CAP_SECS {
            return invalid(format!(
                "health.backoff_cap_secs must be at most {MAX_BACKOFF_CAP_SECS}"
            ));
        }
        if self.cache.backend != CacheBackendKind::Disabled {
            if self.cache.news_ttl_secs == 0 || self.cache.search_ttl_secs == 0 {
                return invalid(
                    "cache TTLs must be greater than 0 when caching is enabled".into(),
                );
            }
            if self.cache.op_timeout_ms == 0 {
                return invalid("cache.op_timeout_ms must be greater than 0".into());
            }
        }
        if self.cache.backend == CacheBackendKind::Rest {
            if self.cache.rest_url.is_none() {
                return invalid("cache.rest_url is required for the rest backend".into());
            }
            if self.cache.rest_token.as_ref().is_none_or(RedactedString::is_blank) {
                return invalid("cache.rest_token is required for the rest backend".into());
            }
        }
        for (name, value) in [
            ("ranking.decay_factor", self.ranking.decay_factor),
            ("ranking.boost_factor", self.ranking.boost_factor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 1]"));
            }
        }
        if self.ranking.over_fetch < pulse_search::retrieval::MIN_OVER_FETCH {
            return invalid(format!(
                "ranking.over_fetch must be at least {}",
                pulse_search::retrieval::MIN_OVER_FETCH
            ));
        }
        if self.index.timeout_secs == 0 || self.embedder.timeout_secs == 0 {
            return invalid("index and embedder timeouts must be greater than 0".into());
        }
        for (cloud, url) in &self.cloud_feeds.urls {
            let slug_ok = !cloud.is_empty()
                && cloud
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
            if !slug_ok {
                return invalid(format!(
                    "cloud_feeds.urls: '{cloud}' must be lowercase a-z, 0-9 or '-'"
                ));
            }
            if url.trim().is_empty() {
                return invalid(format!("cloud_feeds.urls.{cloud} must not be empty"));
            }
        }
        Ok(())
    }

    /// The engine's view of this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            provider_timeout: Duration::from_secs(self.providers.timeout_secs),
            news_ttl: Duration::from_secs(self.cache.news_ttl_secs),
            search_ttl: Duration::from_secs(self.cache.search_ttl_secs),
            ranking: RankingParams::new(self.ranking.decay_factor, self.ranking.boost_factor),
            over_fetch: self.ranking.over_fetch,
            health: HealthConfig {
                failure_threshold: self.health.failure_threshold,
                backoff_base: Duration::from_secs(self.health.backoff_base_secs),
                backoff_cap: Duration::from_secs(self.health.backoff_cap_secs),
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ServiceError::Config(format!("{key}: cannot parse '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers.priority, KNOWN_PROVIDERS);
        assert_eq!(config.providers.timeout_secs, 10);
        assert_eq!(config.cache.news_ttl_secs, 120);
        assert_eq!(config.cache.search_ttl_secs, 300);
        assert_eq!(config.cache.op_timeout_ms, 250);
        assert_eq!(config.ranking.over_fetch, 3);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = ServiceConfig::default();
        config
            .apply_env(env(&[
                ("PULSE_PROVIDER_PRIORITY", "google_rss, GNews"),
                ("PULSE_FAILURE_THRESHOLD", "5"),
                ("PULSE_CACHE_BACKEND", "disabled"),
                ("PULSE_DECAY_FACTOR", "0.25"),
                ("PULSE_PORT", "9090"),
                ("GNEWS_API_KEY", "secret"),
                ("PULSE_EMBEDDER_URL", "  "),
            ]))
            .unwrap();

        assert_eq!(config.providers.priority, vec!["google_rss", "gnews"]);
        assert_eq!(config.health.failure_threshold, 5);
        assert_eq!(config.cache.backend, CacheBackendKind::Disabled);
        assert!((config.ranking.decay_factor - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.server.port, 9090);
        let gnews_key = config.providers.gnews.api_key.as_ref().map(|k| k.as_str());
        assert_eq!(gnews_key, Some("secret"));
        assert!(config.embedder.url.is_none());
    }

    #[test]
    fn unparseable_override_names_the_variable() {
        let mut config = ServiceConfig::default();
        let err = config.apply_env(env(&[("PULSE_OVER_FETCH", "lots")])).unwrap_err();
        assert!(err.to_string().contains("PULSE_OVER_FETCH"));
    }

    #[test]
    fn unknown_cache_backend_rejected() {
        let mut config = ServiceConfig::default();
        assert!(config.apply_env(env(&[("PULSE_CACHE_BACKEND", "memcached")])).is_err());
    }

    #[test]
    fn empty_priority_rejected() {
        let mut config = ServiceConfig::default();
        config.providers.priority.clear();
        assert!(config.validate().unwrap_err().to_string().contains("priority"));
    }

    #[test]
    fn unknown_and_duplicate_providers_rejected() {
        let mut config = ServiceConfig::default();
        config.providers.priority = vec!["bing".into()];
        assert!(config.validate().unwrap_err().to_string().contains("unknown provider"));

        config.providers.priority = vec!["gnews".into(), "gnews".into()];
        assert!(config.validate().unwrap_err().to_string().contains("twice"));
    }

    #[test]
    fn zero_timeout_and_threshold_rejected() {
        let mut config = ServiceConfig::default();
        config.providers.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.health.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_backoff_rejected() {
        let mut config = ServiceConfig::default();
        config.health.backoff_base_secs = 3600;
        assert!(config.validate().unwrap_err().to_string().contains("backoff"));
    }

    #[test]
    fn oversized_backoff_cap_rejected() {
        let mut config = ServiceConfig::default();
        config.health.backoff_cap_secs = u64::MAX;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("backoff_cap_secs"));

        config.health.backoff_cap_secs = MAX_BACKOFF_CAP_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn daily_limits_and_feed_switch_from_env() {
        let mut config = ServiceConfig::default();
        config
            .apply_env(env(&[
                ("GNEWS_DAILY_LIMIT", "50"),
                ("NEWSDATA_DAILY_LIMIT", "0"),
                ("PULSE_CLOUD_FEEDS", "false"),
            ]))
            .unwrap();
        assert_eq!(config.providers.gnews.daily_limit, Some(50));
        assert_eq!(config.providers.newsdata.daily_limit, Some(0));
        assert!(config.providers.newsapi.daily_limit.is_none());
        assert!(!config.cloud_feeds.enabled);

        let err = config.apply_env(env(&[("NEWSAPI_DAILY_LIMIT", "-1")])).unwrap_err();
        assert!(err.to_string().contains("NEWSAPI_DAILY_LIMIT"));
    }

    #[test]
    fn malformed_feed_override_rejected() {
        let mut config = ServiceConfig::default();
        config.cloud_feeds.urls.insert("Big Cloud".into(), "https://x.example.com".into());
        assert!(config.validate().unwrap_err().to_string().contains("cloud_feeds"));

        config.cloud_feeds.urls.clear();
        config.cloud_feeds.urls.insert("linode".into(), " ".into());
        assert!(config.validate().unwrap_err().to_string().contains("linode"));
    }

    #[test]
    fn small_over_fetch_rejected() {
        let mut config = ServiceConfig::default();
        config.ranking.over_fetch = 2;
        assert!(config.validate().unwrap_err().to_string().contains("over_fetch"));
    }

    #[test]
    fn zero_ttl_only_matters_when_caching() {
        let mut config = ServiceConfig::default();
        config.cache.news_ttl_secs = 0;
        assert!(config.validate().is_err());
        config.cache.backend = CacheBackendKind::Disabled;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rest_backend_needs_url_and_token() {
        let mut config = ServiceConfig::default();
        config.cache.backend = CacheBackendKind::Rest;
        assert!(config.validate().unwrap_err().to_string().contains("rest_url"));
        config.cache.rest_url = Some("https://cache.example.com".into());
        assert!(config.validate().unwrap_err().to_string().contains("rest_token"));
        config.cache.rest_token = Some(RedactedString::new("tok"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn out_of_range_factor_rejected() {
        let mut config = ServiceConfig::default();
        config.ranking.decay_factor = 1.5;
        assert!(config.validate().unwrap_err().to_string().contains("decay_factor"));
    }

    #[test]
    fn engine_settings_carry_values() {
        let mut config = ServiceConfig::default();
        config.providers.timeout_secs = 4;
        config.health.backoff_base_secs = 10;
        let settings = config.engine_settings();
        assert_eq!(settings.provider_timeout, Duration::from_secs(4));
        assert_eq!(settings.health.backoff_base, Duration::from_secs(10));
        assert_eq!(settings.news_ttl, Duration::from_secs(120));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn debug_output_hides_keys() {
        let mut config = ServiceConfig::default();
        config.providers.newsapi.api_key = Some(RedactedString::new("do-not-print"));
        assert!(!format!("{config:?}").contains("do-not-print"));
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = ServiceConfig::from_file(Path::new("/nonexistent/path/pulse.toml"));
        assert!(result.is_err());
    }
}
