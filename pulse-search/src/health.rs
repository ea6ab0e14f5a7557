//! Per-provider health tracking for failover.
//!
//! Tracks consecutive failures per upstream provider and takes providers out
//! of rotation while they cool down. Cool-down expiry is a plain comparison
//! against a stored deadline, evaluated whenever eligibility is checked; no
//! background timer is involved.
//!
//! # State Machine
//!
//! ```text
//!               failure (< threshold)
//! ┌─────────┐ ──────────────────────► ┌──────────┐
//! │ Healthy │                         │ Degraded │
//! └─────────┘ ◄────────────────────── └──────────┘
//!      │            success              │    ▲
//!      │ rate limited                    │    │ deadline passed
//!      │                 failure (>= threshold) / rate limited
//!      ▼                                 ▼    │
//!  ┌─────────────────────────────────────────────┐
//!  │                 CoolingDown                 │
//!  └─────────────────────────────────────────────┘
//! ```
//!
//! CoolingDown is left only when its deadline passes, never because of a
//! call outcome. Outcomes that arrive while a provider is still cooling down
//! belong to calls issued before the cool-down started and are dropped.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Availability state of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    /// Last call succeeded.
    Healthy,
    /// Recent failures, or probationary after a cool-down.
    Degraded,
    /// Ineligible until the cool-down deadline passes.
    CoolingDown,
}

/// Result of one provider call, as recorded by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Timeout,
    /// Upstream asked us to back off, optionally saying for how long.
    RateLimited { retry_after: Option<Duration> },
    ServerError,
}

/// Health tracking data for a single provider.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub state: ProviderState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Set while cooling down.
    pub cooldown_until: Option<Instant>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            state: ProviderState::Healthy,
            consecutive_failures: 0,
            cooldown_until: None,
        }
    }
}

/// Configuration for failure thresholds and backoff.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Consecutive timeouts/server errors before cooling down.
    pub failure_threshold: u32,
    /// First cool-down length; doubles for every failure past the threshold.
    pub backoff_base: Duration,
    /// Upper bound for any cool-down, including upstream retry-after hints.
    pub backoff_cap: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            backoff_base: Duration::from_secs(30),
            backoff_cap: Duration::from_secs(30 * 60),
        }
    }
}

impl HealthConfig {
    /// Cool-down length after `failures` consecutive failures.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(self.failure_threshold).min(20);
        self.backoff_base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.backoff_cap)
            .min(self.backoff_cap)
    }
}

/// Point-in-time view of one provider for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub name: String,
    /// Position in the priority order, 0 = preferred.
    pub priority: usize,
    pub state: ProviderState,
    pub eligible: bool,
    pub consecutive_failures: u32,
    pub cooldown_remaining_secs: u64,
}

/// Registry of provider health, injected into the orchestrator.
///
/// The provider set and its priority order are fixed at construction.
/// Each provider has its own lock so that one outcome is one atomic
/// transition, and concurrent requests on different providers never contend.
#[derive(Debug)]
pub struct HealthTracker {
    config: HealthConfig,
    providers: Vec<(String, Mutex<ProviderHealth>)>,
}

impl HealthTracker {
    /// Register providers in priority order. Duplicate names keep their
    /// first position.
    pub fn new<I, S>(config: HealthConfig, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registered: Vec<(String, Mutex<ProviderHealth>)> = Vec::new();
        for name in providers {
            let name = name.into();
            if registered.iter().any(|(existing, _)| *existing == name) {
                tracing::warn!(provider = %name, "duplicate provider registration ignored");
                continue;
            }
            registered.push((name, Mutex::new(ProviderHealth::default())));
        }
        Self {
            config,
            providers: registered,
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Provider names in priority order.
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|(name, _)| name.as_str())
    }

    /// Record the outcome of one call and return the resulting state.
    ///
    /// Returns `None` for providers that were never registered.
    pub fn record_outcome(
        &self,
        provider: &str,
        outcome: Outcome,
        now: Instant,
    ) -> Option<ProviderState> {
        let mut health = self.lock(provider)?;
        expire_cooldown(&mut health, now);

        if health.state == ProviderState::CoolingDown {
            tracing::debug!(provider, ?outcome, "outcome during cool-down dropped");
            return Some(health.state);
        }

        match outcome {
            Outcome::Success => {
                health.state = ProviderState::Healthy;
                health.consecutive_failures = 0;
                health.cooldown_until = None;
            }
            Outcome::Timeout | Outcome::ServerError => {
                health.consecutive_failures = health.consecutive_failures.saturating_add(1);
                if health.consecutive_failures >= self.config.failure_threshold {
                    let cooldown = self.config.backoff(health.consecutive_failures);
                    start_cooldown(&mut health, provider, now, cooldown);
                } else {
                    health.state = ProviderState::Degraded;
                }
            }
            Outcome::RateLimited { retry_after } => {
                health.consecutive_failures = health.consecutive_failures.saturating_add(1);
                let cooldown = match retry_after {
                    Some(hint) => hint.min(self.config.backoff_cap),
                    None => self.config.backoff(health.consecutive_failures),
                };
                start_cooldown(&mut health, provider, now, cooldown);
            }
        }

        Some(health.state)
    }

    /// Whether `provider` may be called at `now`.
    ///
    /// A provider whose cool-down has passed becomes eligible again in the
    /// Degraded state. Unknown providers are never eligible.
    pub fn is_eligible(&self, provider: &str, now: Instant) -> bool {
        let Some(mut health) = self.lock(provider) else {
            return false;
        };
        expire_cooldown(&mut health, now);
        health.state != ProviderState::CoolingDown
    }

    /// Current health for one provider, with any expired cool-down applied.
    pub fn health(&self, provider: &str, now: Instant) -> Option<ProviderHealth> {
        let mut health = self.lock(provider)?;
        expire_cooldown(&mut health, now);
        Some(health.clone())
    }

    /// Snapshot of every provider in priority order.
    pub fn snapshot(&self, now: Instant) -> Vec<ProviderSnapshot> {
        self.providers
            .iter()
            .enumerate()
            .map(|(priority, (name, slot))| {
                let mut health = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                expire_cooldown(&mut health, now);
                let remaining = health
                    .cooldown_until
                    .map(|until| until.saturating_duration_since(now))
                    .unwrap_or_default();
                ProviderSnapshot {
                    name: name.clone(),
                    priority,
                    state: health.state,
                    eligible: health.state != ProviderState::CoolingDown,
                    consecutive_failures: health.consecutive_failures,
                    cooldown_remaining_secs: remaining.as_secs(),
                }
            })
            .collect()
    }

    fn lock(&self, provider: &str) -> Option<MutexGuard<'_, ProviderHealth>> {
        let (_, slot) = self.providers.iter().find(|(name, _)| name == provider)?;
        Some(slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

fn expire_cooldown(health: &mut ProviderHealth, now: Instant) {
    if health.state != ProviderState::CoolingDown {
        return;
    }
    if health.cooldown_until.is_none_or(|until| now >= until) {
        health.state = ProviderState::Degraded;
        health.cooldown_until = None;
    }
}

/// Deadline used when `now + cooldown` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

fn start_cooldown(health: &mut ProviderHealth, provider: &str, now: Instant, cooldown: Duration) {
    health.state = ProviderState::CoolingDown;
    let until = now
        .checked_add(cooldown)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now);
    health.cooldown_until = Some(until);
    tracing::warn!(
        provider,
        failures = health.consecutive_failures,
        cooldown_secs = cooldown.as_secs(),
        "provider cooling down"
    );
}
