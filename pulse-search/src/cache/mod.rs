//! Fail-open cache layer in front of the fetch and search paths.
//!
//! [`FailOpenCache`] wraps a pluggable [`CacheBackend`] and guarantees that
//! cache trouble never reaches the caller: every operation runs under a short
//! timeout, a failed or slow `get` is a miss, and a failed `set` is a silent
//! no-op. The request path then runs at full latency instead of failing.

pub mod memory;
pub mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Why a backend operation failed. Never leaves this module's callers.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache protocol error: {0}")]
    Protocol(String),
}

/// A key/value store with per-entry TTL.
///
/// Implementations must tolerate concurrent get/set on one key; the last
/// writer wins.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Deterministic cache key over normalised request parameters.
///
/// Identical logical requests produce the same key; any differing field
/// produces a different one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Start a key in `namespace` (e.g. `news`, `search:v2`).
    pub fn builder(namespace: &str) -> CacheKeyBuilder {
        CacheKeyBuilder {
            namespace: namespace.to_owned(),
            hasher: blake3::Hasher::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct CacheKeyBuilder {
    namespace: String,
    hasher: blake3::Hasher,
}

impl CacheKeyBuilder {
    /// Add a named field. Text is trimmed and lowercased.
    pub fn text(self, name: &str, value: &str) -> Self {
        let normalised = value.trim().to_lowercase();
        self.raw(name, &normalised)
    }

    /// Add an optional text field; `None` and blank hash the same.
    pub fn opt_text(self, name: &str, value: Option<&str>) -> Self {
        self.text(name, value.unwrap_or_default())
    }

    pub fn number(self, name: &str, value: u64) -> Self {
        self.raw(name, &value.to_string())
    }

    /// Add a float rounded to four decimals, so 0.1 and 0.10000001 collide.
    pub fn float(self, name: &str, value: f64) -> Self {
        self.raw(name, &format!("{value:.4}"))
    }

    fn raw(mut self, name: &str, value: &str) -> Self {
        // Length-prefixed so ("ab","c") never collides with ("a","bc").
        for part in [name, value] {
            self.hasher.update(&(part.len() as u64).to_le_bytes());
            self.hasher.update(part.as_bytes());
        }
        self
    }

    pub fn build(self) -> CacheKey {
        let digest = self.hasher.finalize().to_hex();
        CacheKey(format!("pulse:{}:{}", self.namespace, &digest[..32]))
    }
}

/// Backend reachability as reported on `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Ok,
    Unavailable,
    Disabled,
}

/// Counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    errors: AtomicU64,
}

/// Cache facade with fail-open semantics.
pub struct FailOpenCache {
    backend: Option<Arc<dyn CacheBackend>>,
    op_timeout: Duration,
    counters: Counters,
}

impl FailOpenCache {
    pub fn new(backend: Arc<dyn CacheBackend>, op_timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            op_timeout,
            counters: Counters::default(),
        }
    }

    /// A cache that always misses.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            op_timeout: Duration::ZERO,
            counters: Counters::default(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map_or("disabled", |b| b.name())
    }

    /// Look up `key`. Backend errors and timeouts are misses.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match tokio::time::timeout(self.op_timeout, backend.get(key.as_str())).await {
            Ok(Ok(Some(value))) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cache_key = %key, "cache hit");
                Some(value)
            }
            Ok(Ok(None)) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Ok(Err(err)) => {
                self.record_error("get", key, &err.to_string());
                None
            }
            Err(_) => {
                self.record_error("get", key, "timed out");
                None
            }
        }
    }

    /// Store `value` under `key`. Failures are logged and dropped.
    pub async fn set(&self, key: &CacheKey, value: String, ttl: Duration) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        match tokio::time::timeout(self.op_timeout, backend.set(key.as_str(), value, ttl)).await {
            Ok(Ok(())) => {
                self.counters.sets.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(err)) => self.record_error("set", key, &err.to_string()),
            Err(_) => self.record_error("set", key, "timed out"),
        }
    }

    /// Look up and decode a JSON payload. Undecodable entries are misses.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                self.record_error("decode", key, &err.to_string());
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, raw, ttl).await,
            Err(err) => self.record_error("encode", key, &err.to_string()),
        }
    }

    /// Check the backend under the operation timeout.
    pub async fn status(&self) -> CacheStatus {
        let Some(backend) = self.backend.as_ref() else {
            return CacheStatus::Disabled;
        };
        match tokio::time::timeout(self.op_timeout, backend.ping()).await {
            Ok(Ok(())) => CacheStatus::Ok,
            _ => CacheStatus::Unavailable,
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    fn record_error(&self, op: &str, key: &CacheKey, error: &str) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            op,
            cache_key = %key,
            error,
            "cache operation failed, continuing without cache"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl CacheBackend for HangingBackend {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            std::future::pending().await
        }

        async fn ping(&self) -> Result<(), CacheError> {
            std::future::pending().await
        }
    }

    fn key(q: &str) -> CacheKey {
        CacheKey::builder("search:v2").text("q", q).number("limit", 20).build()
    }

    #[test]
    fn key_deterministic_and_normalised() {
        assert_eq!(key("Rust News"), key("  rust news "));
        assert_ne!(key("rust"), key("python"));
        assert!(key("rust").as_str().starts_with("pulse:search:v2:"));
    }

    #[test]
    fn key_differs_per_field() {
        let base = || CacheKey::builder("search:v2").text("q", "rust");
        let a = base().opt_text("category", Some("ai")).build();
        let b = base().opt_text("category", Some("cloud")).build();
        let c = base().opt_text("category", None).build();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(c, base().opt_text("category", Some(" ")).build());
    }

    #[test]
    fn key_field_boundaries_do_not_collide() {
        let a = CacheKey::builder("n").text("q", "ab").text("c", "x").build();
        let b = CacheKey::builder("n").text("q", "a").text("bc", "x").build();
        assert_ne!(a, b);
    }

    #[test]
    fn key_floats_rounded() {
        let a = CacheKey::builder("n").float("decay", 0.1).build();
        let b = CacheKey::builder("n").float("decay", 0.100_000_01).build();
        let c = CacheKey::builder("n").float("decay", 0.2).build();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn namespaces_separate_keys() {
        let a = CacheKey::builder("news").text("category", "ai").build();
        let b = CacheKey::builder("search").text("category", "ai").build();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn broken_backend_fails_open() {
        let cache = FailOpenCache::new(Arc::new(BrokenBackend), Duration::from_millis(50));
        assert!(cache.get(&key("x")).await.is_none());
        cache.set(&key("x"), "v".into(), Duration::from_secs(60)).await;
        assert_eq!(cache.status().await, CacheStatus::Unavailable);
        assert_eq!(cache.stats().errors, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_backend_times_out_as_miss() {
        let cache = FailOpenCache::new(Arc::new(HangingBackend), Duration::from_millis(50));
        assert!(cache.get(&key("x")).await.is_none());
        cache.set(&key("x"), "v".into(), Duration::from_secs(60)).await;
        assert_eq!(cache.status().await, CacheStatus::Unavailable);
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = FailOpenCache::disabled();
        cache.set(&key("x"), "v".into(), Duration::from_secs(60)).await;
        assert!(cache.get(&key("x")).await.is_none());
        assert_eq!(cache.status().await, CacheStatus::Disabled);
        assert_eq!(cache.backend_name(), "disabled");
    }

    #[tokio::test]
    async fn json_roundtrip_through_memory_backend() {
        let backend = Arc::new(MemoryBackend::new(16));
        let cache = FailOpenCache::new(backend, Duration::from_millis(250));
        cache.set_json(&key("x"), &vec![1u32, 2, 3], Duration::from_secs(60)).await;
        let got: Option<Vec<u32>> = cache.get_json(&key("x")).await;
        assert_eq!(got, Some(vec![1, 2, 3]));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.sets), (1, 1));
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let backend = Arc::new(MemoryBackend::new(16));
        let cache = FailOpenCache::new(backend, Duration::from_millis(250));
        cache.set(&key("x"), "not json".into(), Duration::from_secs(60)).await;
        let got: Option<Vec<u32>> = cache.get_json(&key("x")).await;
        assert!(got.is_none());
        assert_eq!(cache.stats().errors, 1);
    }
}
