//! In-process cache backend.
//!
//! Uses [`moka`] for bounded capacity only. Expiry is lazy: every entry
//! carries its own creation time and TTL, and a read after expiry is a miss.
//! Reads never remove anything, so a read cannot erase a write that lands
//! between its lookup and a removal. Expired entries stay until a `set`
//! replaces them or capacity eviction reclaims them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::time::Instant;

use super::{CacheBackend, CacheError};

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<str>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

pub struct MemoryBackend {
    entries: Cache<String, CacheEntry>,
}

impl MemoryBackend {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_entries).build(),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .entries
            .get(key)
            .await
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.payload.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            payload: Arc::from(value),
            created_at: Instant::now(),
            ttl,
        };
        self.entries.insert(key.to_owned(), entry).await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_returns_none() {
        let backend = MemoryBackend::new(8);
        assert_eq!(backend.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let backend = MemoryBackend::new(8);
        backend.set("k", "v".into(), Duration::from_secs(120)).await.unwrap();

        tokio::time::advance(Duration::from_secs(119)).await;
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let backend = MemoryBackend::new(8);
        backend.set("k", "old".into(), Duration::from_secs(60)).await.unwrap();
        backend.set("k", "new".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let backend = MemoryBackend::new(8);
        backend.set("a", "1".into(), Duration::from_secs(60)).await.unwrap();
        backend.set("b", "2".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(backend.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn zero_ttl_is_immediately_expired() {
        let backend = MemoryBackend::new(8);
        backend.set("k", "v".into(), Duration::ZERO).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_read_then_set_keeps_fresh_value() {
        let backend = MemoryBackend::new(8);
        backend.set("k", "stale".into(), Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(backend.get("k").await.unwrap(), None);
        backend.set("k", "fresh".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_expired_reads_never_drop_fresh_writes() {
        let backend = Arc::new(MemoryBackend::new(10_000));
        for i in 0..2_000 {
            let key = format!("k{i}");
            backend.set(&key, "stale".into(), Duration::ZERO).await.unwrap();

            let reader = {
                let backend = Arc::clone(&backend);
                let key = key.clone();
                tokio::spawn(async move { backend.get(&key).await })
            };
            let writer = {
                let backend = Arc::clone(&backend);
                let key = key.clone();
                tokio::spawn(async move {
                    backend.set(&key, "fresh".into(), Duration::from_secs(60)).await
                })
            };
            let _ = reader.await.unwrap();
            writer.await.unwrap().unwrap();

            assert_eq!(backend.get(&key).await.unwrap().as_deref(), Some("fresh"), "{key}");
        }
    }
}
