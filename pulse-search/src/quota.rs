//! Per-provider daily request quotas.
//!
//! Free upstream tiers cap requests per day. The orchestrator asks the
//! [`QuotaTracker`] for a slot before each call, so a provider that has used
//! its allowance is skipped before it starts answering 429.
//!
//! A window opens with the first call and lasts [`QUOTA_WINDOW`]; the count
//! resets lazily on the first check after the window closes. A limit of 0
//! means unlimited.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Length of one quota window.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
struct Window {
    used: u32,
    opened_at: Option<Instant>,
}

impl Window {
    fn roll(&mut self, now: Instant) {
        if self
            .opened_at
            .is_some_and(|opened| now.saturating_duration_since(opened) >= QUOTA_WINDOW)
        {
            self.used = 0;
            self.opened_at = None;
        }
    }
}

#[derive(Debug)]
struct Slot {
    name: String,
    daily_limit: u32,
    window: Mutex<Window>,
}

/// Point-in-time quota usage for `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub provider: String,
    /// 0 = unlimited.
    pub daily_limit: u32,
    pub used: u32,
    pub exhausted: bool,
    pub resets_in_secs: u64,
}

/// Daily call counters, one lock per provider.
///
/// Providers that were never given a limit are unlimited.
#[derive(Debug, Default)]
pub struct QuotaTracker {
    slots: Vec<Slot>,
}

impl QuotaTracker {
    pub fn new<I, S>(limits: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut slots: Vec<Slot> = Vec::new();
        for (name, daily_limit) in limits {
            let name = name.into();
            if slots.iter().any(|s| s.name == name) {
                continue;
            }
            slots.push(Slot {
                name,
                daily_limit,
                window: Mutex::new(Window::default()),
            });
        }
        Self { slots }
    }

    /// No limits at all.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Whether `provider` has at least one call left at `now`.
    pub fn has_quota(&self, provider: &str, now: Instant) -> bool {
        let Some((slot, mut window)) = self.lock(provider) else {
            return true;
        };
        window.roll(now);
        slot.daily_limit == 0 || window.used < slot.daily_limit
    }

    /// Take one call from the allowance. Returns `false`, and takes
    /// nothing, when the allowance is used up.
    pub fn try_acquire(&self, provider: &str, now: Instant) -> bool {
        let Some((slot, mut window)) = self.lock(provider) else {
            return true;
        };
        if slot.daily_limit == 0 {
            return true;
        }
        window.roll(now);
        if window.used >= slot.daily_limit {
            return false;
        }
        window.used += 1;
        window.opened_at.get_or_insert(now);

        let used = window.used;
        if used == slot.daily_limit {
            tracing::warn!(provider, used, limit = slot.daily_limit, "daily quota used up");
        } else if u64::from(used) * 10 >= u64::from(slot.daily_limit) * 9 {
            tracing::debug!(provider, used, limit = slot.daily_limit, "approaching daily quota");
        }
        true
    }

    /// Usage for every limited provider, in registration order.
    pub fn snapshot(&self, now: Instant) -> Vec<QuotaSnapshot> {
        self.slots
            .iter()
            .filter(|slot| slot.daily_limit > 0)
            .map(|slot| {
                let mut window = slot.window.lock().unwrap_or_else(|p| p.into_inner());
                window.roll(now);
                let resets_in = window
                    .opened_at
                    .map(|opened| (opened + QUOTA_WINDOW).saturating_duration_since(now))
                    .unwrap_or_default();
                QuotaSnapshot {
                    provider: slot.name.clone(),
                    daily_limit: slot.daily_limit,
                    used: window.used,
                    exhausted: window.used >= slot.daily_limit,
                    resets_in_secs: resets_in.as_secs(),
                }
            })
            .collect()
    }

    fn lock(&self, provider: &str) -> Option<(&Slot, MutexGuard<'_, Window>)> {
        let slot = self.slots.iter().find(|s| s.name == provider)?;
        let window = slot.window.lock().unwrap_or_else(|p| p.into_inner());
        Some((slot, window))
    }
}
