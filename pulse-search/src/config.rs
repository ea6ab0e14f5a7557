//! Engine settings with sensible defaults.
//!
//! [`EngineSettings`] controls provider call timeouts, cache lifetimes, the
//! ranking factors, the retrieval over-fetch multiplier and the health
//! tracker's cool-down policy. The host service builds one from its own
//! configuration file and environment.

use std::time::Duration;

use crate::error::SearchError;
use crate::health::HealthConfig;
use crate::orchestrator::ranking::RankingParams;
use crate::retrieval::MIN_OVER_FETCH;

/// Result count used when a request does not name one.
pub const DEFAULT_LIMIT: usize = 20;
/// Largest result count a request may ask for.
pub const MAX_LIMIT: usize = 100;

/// Settings shared by every pipeline of a [`crate::PulseService`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Bound on a single provider call.
    pub provider_timeout: Duration,
    /// Lifetime of cached `/news/{category}` responses.
    pub news_ttl: Duration,
    /// Lifetime of cached search responses (both search paths).
    pub search_ttl: Duration,
    /// Default decay and boost factors.
    pub ranking: RankingParams,
    /// Index over-fetch multiplier, at least [`MIN_OVER_FETCH`].
    pub over_fetch: usize,
    pub health: HealthConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(10),
            news_ttl: Duration::from_secs(120),
            search_ttl: Duration::from_secs(300),
            ranking: RankingParams::default(),
            over_fetch: MIN_OVER_FETCH,
            health: HealthConfig::default(),
        }
    }
}

impl EngineSettings {
    /// Validates these settings, returning an error naming the first bad field.
    ///
    /// Checks:
    /// - `provider_timeout` must be greater than 0
    /// - `health.failure_threshold` must be at least 1
    /// - `health.backoff_base` must be greater than 0 and <= `health.backoff_cap`
    /// - `over_fetch` must be at least 3
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.provider_timeout.is_zero() {
            return Err(SearchError::Config(
                "provider_timeout must be greater than 0".into(),
            ));
        }
        if self.health.failure_threshold == 0 {
            return Err(SearchError::Config(
                "failure_threshold must be at least 1".into(),
            ));
        }
        if self.health.backoff_base.is_zero() {
            return Err(SearchError::Config(
                "backoff_base must be greater than 0".into(),
            ));
        }
        if self.health.backoff_base > self.health.backoff_cap {
            return Err(SearchError::Config(
                "backoff_base must be <= backoff_cap".into(),
            ));
        }
        if self.over_fetch < MIN_OVER_FETCH {
            return Err(SearchError::Config(format!(
                "over_fetch must be at least {MIN_OVER_FETCH}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_have_documented_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.provider_timeout, Duration::from_secs(10));
        assert_eq!(settings.news_ttl, Duration::from_secs(120));
        assert_eq!(settings.search_ttl, Duration::from_secs(300));
        assert_eq!(settings.over_fetch, 3);
        assert!((settings.ranking.decay_factor() - 0.1).abs() < f64::EPSILON);
        assert!((settings.ranking.boost_factor() - 0.05).abs() < f64::EPSILON);
        assert_eq!(settings.health.failure_threshold, 3);
    }

    #[test]
    fn valid_settings_pass_validation() {
        assert!(EngineSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let settings = EngineSettings {
            provider_timeout: Duration::ZERO,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("provider_timeout"));
    }

    #[test]
    fn zero_threshold_rejected() {
        let mut settings = EngineSettings::default();
        settings.health.failure_threshold = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("failure_threshold"));
    }

    #[test]
    fn inverted_backoff_rejected() {
        let mut settings = EngineSettings::default();
        settings.health.backoff_base = Duration::from_secs(60);
        settings.health.backoff_cap = Duration::from_secs(30);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("backoff_base"));
    }

    #[test]
    fn small_over_fetch_rejected() {
        let settings = EngineSettings {
            over_fetch: 2,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
        assert!(err.to_string().contains("over_fetch"));
    }
}
