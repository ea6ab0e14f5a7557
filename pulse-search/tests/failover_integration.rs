//! Failover behaviour through the public service API.
//!
//! Providers are in-process stubs whose behaviour can be switched between
//! calls; tokio's paused clock drives cool-down expiry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pulse_search::{
    AttemptOutcome, Candidate, EngineSettings, HealthConfig, NewsProvider, ProviderFailure,
    ProviderState, PulseService, SearchError, Topic,
};

#[derive(Clone)]
enum Behaviour {
    Articles(usize),
    Fail(ProviderFailure),
}

struct StubProvider {
    name: &'static str,
    behaviour: Mutex<Behaviour>,
    calls: AtomicUsize,
}

impl StubProvider {
    fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name,
            behaviour: Mutex::new(behaviour),
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsProvider for StubProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(
        &self,
        topic: &Topic,
        _limit: usize,
    ) -> Result<Vec<Candidate>, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.behaviour.lock().unwrap().clone();
        match behaviour {
            Behaviour::Articles(n) => Ok((0..n)
                .map(|i| {
                    Candidate::new(
                        format!("{} story {i}", self.name),
                        format!("https://{}.example.com/{i}", self.name),
                        Utc::now(),
                    )
                    .with_category(topic.category_label())
                    .with_source(self.name)
                })
                .collect()),
            Behaviour::Fail(failure) => Err(failure),
        }
    }
}

fn rate_limited() -> Behaviour {
    Behaviour::Fail(ProviderFailure::RateLimited { retry_after: None })
}

fn settings() -> EngineSettings {
    EngineSettings {
        health: HealthConfig {
            failure_threshold: 3,
            backoff_base: Duration::from_secs(30),
            backoff_cap: Duration::from_secs(1800),
        },
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_primary_is_bypassed_then_recovers() {
    let primary = StubProvider::new("primary", rate_limited());
    let secondary = StubProvider::new("secondary", Behaviour::Articles(3));
    let service = PulseService::builder(settings())
        .provider(primary.clone())
        .provider(secondary.clone())
        .build()
        .unwrap();

    // First request: primary is rate limited, secondary serves.
    let first = service.news("ai").await.unwrap();
    assert_eq!(first.provider, "secondary");
    assert_eq!(primary.calls(), 1);

    // During the cool-down the primary is not called at all.
    primary.set(Behaviour::Articles(2));
    let second = service.news("cloud-computing").await.unwrap();
    assert_eq!(second.provider, "secondary");
    assert_eq!(primary.calls(), 1);

    // Once the cool-down has passed the primary is preferred again.
    tokio::time::advance(Duration::from_secs(30)).await;
    let third = service.news("data-laws").await.unwrap();
    assert_eq!(third.provider, "primary");
    assert_eq!(primary.calls(), 2);

    let health = service.health().await;
    assert_eq!(health.providers[0].state, ProviderState::Healthy);
    assert_eq!(health.stats.failovers, 2);
}

#[tokio::test(start_paused = true)]
async fn server_errors_cool_down_only_at_threshold() {
    let failing = Behaviour::Fail(ProviderFailure::ServerError("HTTP 500".into()));
    let primary = StubProvider::new("primary", failing);
    let secondary = StubProvider::new("secondary", Behaviour::Articles(1));
    let service = PulseService::builder(settings())
        .provider(primary.clone())
        .provider(secondary)
        .build()
        .unwrap();

    for (i, category) in ["a1", "a2", "a3"].iter().enumerate() {
        service.news(category).await.unwrap();
        assert_eq!(primary.calls(), i + 1);
    }

    let report = service.health().await;
    assert_eq!(report.providers[0].state, ProviderState::CoolingDown);
    assert!(!report.providers[0].eligible);
    assert_eq!(report.providers[0].cooldown_remaining_secs, 30);

    service.news("a4").await.unwrap();
    assert_eq!(primary.calls(), 3, "cooling-down provider must be skipped");
}

#[tokio::test]
async fn exhaustion_names_every_provider() {
    let service = PulseService::builder(settings())
        .provider(StubProvider::new("gnews", rate_limited()))
        .provider(StubProvider::new(
            "newsapi",
            Behaviour::Fail(ProviderFailure::ServerError("HTTP 502".into())),
        ))
        .provider(StubProvider::new("google_rss", Behaviour::Fail(ProviderFailure::Timeout)))
        .build()
        .unwrap();

    let err = service.news("ai").await.unwrap_err();
    assert_eq!(err.code(), "ALL_PROVIDERS_EXHAUSTED");
    let SearchError::AllProvidersExhausted { attempts } = err else {
        panic!("expected exhaustion");
    };
    let log: Vec<(&str, AttemptOutcome)> =
        attempts.iter().map(|a| (a.provider.as_str(), a.outcome)).collect();
    assert_eq!(
        log,
        vec![
            ("gnews", AttemptOutcome::RateLimited),
            ("newsapi", AttemptOutcome::ServerError),
            ("google_rss", AttemptOutcome::Timeout),
        ]
    );
}

#[tokio::test]
async fn concurrent_requests_share_health_state() {
    let primary = StubProvider::new("primary", rate_limited());
    let secondary = StubProvider::new("secondary", Behaviour::Articles(2));
    let service = Arc::new(
        PulseService::builder(settings())
            .provider(primary.clone())
            .provider(secondary)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.news(&format!("topic-{i}")).await })
        })
        .collect();
    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.provider, "secondary");
    }

    let report = service.health().await;
    assert_eq!(report.providers[0].state, ProviderState::CoolingDown);
    assert_eq!(report.stats.total_fetches, 16);
}

#[tokio::test]
async fn news_ranks_by_recency_without_distance() {
    let service = PulseService::builder(settings())
        .provider(StubProvider::new("only", Behaviour::Articles(5)))
        .build()
        .unwrap();

    let response = service.news("ai").await.unwrap();
    assert_eq!(response.count, 5);
    assert!(response.articles.iter().all(|a| (a.relevance_score - 1.0).abs() < 1e-9));
    assert!(response
        .articles
        .windows(2)
        .all(|w| w[0].final_score >= w[1].final_score));
}

#[tokio::test]
async fn empty_primary_answer_falls_through_without_penalty() {
    let primary = StubProvider::new("primary", Behaviour::Articles(0));
    let secondary = StubProvider::new("secondary", Behaviour::Articles(4));
    let service = PulseService::builder(settings())
        .provider(primary.clone())
        .provider(secondary.clone())
        .build()
        .unwrap();

    for category in ["quantum", "robotics", "chips"] {
        let response = service.news(category).await.unwrap();
        assert_eq!(response.provider, "secondary");
        assert_eq!(response.count, 4);
    }
    assert_eq!(primary.calls(), 3);

    let report = service.health().await;
    assert_eq!(report.providers[0].state, ProviderState::Healthy);
    assert_eq!(report.providers[0].consecutive_failures, 0);
}

#[tokio::test]
async fn all_empty_answers_are_a_successful_empty_response() {
    let service = PulseService::builder(settings())
        .provider(StubProvider::new("primary", Behaviour::Articles(0)))
        .provider(StubProvider::new("secondary", Behaviour::Articles(0)))
        .build()
        .unwrap();

    let response = service.news("obscure-topic").await.unwrap();
    assert!(response.success);
    assert_eq!(response.provider, "primary");
    assert_eq!(response.count, 0);
}
