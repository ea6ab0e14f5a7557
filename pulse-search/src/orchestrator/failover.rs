//! Sequential, priority-ordered failover across news providers.
//!
//! Providers are tried one at a time in ascending priority order. Providers
//! that are cooling down or out of daily quota are skipped, each call runs
//! under a bounded timeout, and every outcome is recorded in the shared
//! [`HealthTracker`]. The first provider that returns articles ends the
//! sequence, so one logical fetch never bills more than one healthy upstream.
//!
//! A provider that answers with no articles is a soft miss: it stays healthy
//! and the next provider is asked. If nobody has articles, the first empty
//! answer is returned rather than an error.
//!
//! If the caller's request is dropped mid-sequence, the in-flight call is
//! dropped with it and no further outcome is recorded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::{AttemptOutcome, ProviderAttempt, SearchError};
use crate::health::{HealthTracker, Outcome};
use crate::provider::{NewsProvider, ProviderFailure};
use crate::quota::QuotaTracker;
use crate::types::{Candidate, Topic};

/// Candidates plus the provider that produced them.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub candidates: Vec<Candidate>,
    pub provider: String,
    /// Providers tried (or skipped) before the one that succeeded.
    pub attempts: Vec<ProviderAttempt>,
}

/// Usage counters since process start.
#[derive(Debug, Clone, Serialize)]
pub struct FailoverStats {
    pub total_fetches: u64,
    /// Fetches that succeeded on a provider other than the first in priority.
    pub failovers: u64,
    /// Successful fetches per provider, in priority order.
    pub provider_usage: Vec<ProviderUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub fetches: u64,
}

pub struct FailoverOrchestrator {
    providers: Vec<Arc<dyn NewsProvider>>,
    tracker: Arc<HealthTracker>,
    quota: Arc<QuotaTracker>,
    call_timeout: Duration,
    total_fetches: AtomicU64,
    failovers: AtomicU64,
    usage: Vec<AtomicU64>,
}

impl FailoverOrchestrator {
    /// `providers` must be in priority order; the tracker is built over the
    /// same names so the two orders match.
    pub fn new(
        providers: Vec<Arc<dyn NewsProvider>>,
        tracker: Arc<HealthTracker>,
        call_timeout: Duration,
    ) -> Self {
        let usage = providers.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            providers,
            tracker,
            quota: Arc::new(QuotaTracker::unlimited()),
            call_timeout,
            total_fetches: AtomicU64::new(0),
            failovers: AtomicU64::new(0),
            usage,
        }
    }

    /// Gate every call on `quota` as well as on health.
    #[must_use]
    pub fn with_quota(mut self, quota: Arc<QuotaTracker>) -> Self {
        self.quota = quota;
        self
    }

    pub fn tracker(&self) -> &Arc<HealthTracker> {
        &self.tracker
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_owned()).collect()
    }

    /// Fetch candidates for `topic` from the first eligible provider that
    /// returns any. When every answer is empty, the first empty one wins.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::AllProvidersExhausted`] with the full attempt
    /// log when no provider is eligible or every eligible provider fails.
    pub async fn fetch(&self, topic: &Topic, limit: usize) -> Result<FetchOutcome, SearchError> {
        self.total_fetches.fetch_add(1, Ordering::Relaxed);
        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        let mut first_empty: Option<(usize, &str)> = None;

        for (position, provider) in self.providers.iter().enumerate() {
            let name = provider.name();

            if !self.tracker.is_eligible(name, Instant::now()) {
                tracing::debug!(provider = name, %topic, "provider cooling down, skipped");
                attempts.push(ProviderAttempt {
                    provider: name.to_owned(),
                    outcome: AttemptOutcome::Skipped,
                });
                continue;
            }

            if !self.quota.try_acquire(name, Instant::now()) {
                tracing::debug!(provider = name, %topic, "daily quota used up, skipped");
                attempts.push(ProviderAttempt {
                    provider: name.to_owned(),
                    outcome: AttemptOutcome::QuotaExhausted,
                });
                continue;
            }

            let started = Instant::now();
            let call = tokio::time::timeout(self.call_timeout, provider.fetch(topic, limit));
            let result = match call.await {
                Ok(result) => result,
                Err(_) => Err(ProviderFailure::Timeout),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(candidates) if candidates.is_empty() => {
                    self.tracker.record_outcome(name, Outcome::Success, Instant::now());
                    tracing::info!(provider = name, %topic, elapsed_ms, "provider had no articles");
                    attempts.push(ProviderAttempt {
                        provider: name.to_owned(),
                        outcome: AttemptOutcome::Empty,
                    });
                    first_empty.get_or_insert((position, name));
                }
                Ok(candidates) => {
                    self.tracker.record_outcome(name, Outcome::Success, Instant::now());
                    self.count_success(position);
                    tracing::info!(
                        provider = name,
                        %topic,
                        count = candidates.len(),
                        elapsed_ms,
                        "provider fetch succeeded"
                    );
                    return Ok(FetchOutcome {
                        candidates,
                        provider: name.to_owned(),
                        attempts,
                    });
                }
                Err(failure) => {
                    self.tracker.record_outcome(name, failure.outcome(), Instant::now());
                    tracing::warn!(
                        provider = name,
                        %topic,
                        error = %failure,
                        elapsed_ms,
                        "provider fetch failed, trying next"
                    );
                    attempts.push(ProviderAttempt {
                        provider: name.to_owned(),
                        outcome: attempt_outcome(&failure),
                    });
                }
            }
        }

        if let Some((position, name)) = first_empty {
            self.count_success(position);
            tracing::info!(provider = name, %topic, "no provider had articles");
            let cut = attempts
                .iter()
                .position(|a| a.provider == name && a.outcome == AttemptOutcome::Empty)
                .unwrap_or(attempts.len());
            attempts.truncate(cut);
            return Ok(FetchOutcome {
                candidates: Vec::new(),
                provider: name.to_owned(),
                attempts,
            });
        }

        tracing::error!(%topic, attempts = attempts.len(), "all providers exhausted");
        Err(SearchError::AllProvidersExhausted { attempts })
    }

    fn count_success(&self, position: usize) {
        if let Some(counter) = self.usage.get(position) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        if position > 0 {
            self.failovers.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> FailoverStats {
        FailoverStats {
            total_fetches: self.total_fetches.load(Ordering::Relaxed),
            failovers: self.failovers.load(Ordering::Relaxed),
            provider_usage: self
                .providers
                .iter()
                .zip(&self.usage)
                .map(|(p, n)| ProviderUsage {
                    provider: p.name().to_owned(),
                    fetches: n.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }
}

fn attempt_outcome(failure: &ProviderFailure) -> AttemptOutcome {
    match failure {
        ProviderFailure::Timeout => AttemptOutcome::Timeout,
        ProviderFailure::RateLimited { .. } => AttemptOutcome::RateLimited,
        ProviderFailure::ServerError(_) => AttemptOutcome::ServerError,
    }
}
