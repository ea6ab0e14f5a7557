//! GNews search API provider.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{build_candidate, parse_timestamp, topic_query};
use crate::http::{send_json, RATE_LIMIT_STATUSES};
use crate::provider::{NewsProvider, ProviderFailure};
use crate::redact::RedactedString;
use crate::types::{Candidate, Topic};

pub const DEFAULT_BASE_URL: &str = "https://gnews.io/api/v4";
/// Free tier allowance.
pub const DEFAULT_DAILY_LIMIT: u32 = 100;

/// The free tier caps `max` at 10.
const MAX_PAGE_SIZE: usize = 10;

const CATEGORY_QUERIES: &[(&str, &str)] = &[
    ("ai", "artificial intelligence machine learning"),
    ("data-security", "data security cybersecurity"),
    ("data-governance", "data governance compliance"),
    ("data-privacy", "data privacy GDPR"),
    ("data-engineering", "data engineering pipeline"),
    ("business-intelligence", "business intelligence BI"),
    ("business-analytics", "business analytics"),
    ("customer-data-platform", "customer data platform CDP"),
    ("data-centers", "data centers infrastructure"),
    ("cloud-computing", "cloud computing AWS Azure Google Cloud"),
    ("magazines", "technology news"),
    ("data-laws", "data privacy law GDPR CCPA AI regulation"),
];

#[derive(Debug, Deserialize)]
struct GNewsResponse {
    #[serde(default)]
    articles: Vec<GNewsArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GNewsArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    image: Option<String>,
    published_at: Option<String>,
    source: Option<GNewsSource>,
}

#[derive(Debug, Deserialize)]
struct GNewsSource {
    name: Option<String>,
}

/// Provider backed by `GET {base}/search`.
pub struct GNewsProvider {
    client: reqwest::Client,
    api_key: RedactedString,
    base_url: String,
}

impl GNewsProvider {
    pub fn new(client: reqwest::Client, api_key: RedactedString) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        api_key: RedactedString,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl NewsProvider for GNewsProvider {
    fn name(&self) -> &str {
        "gnews"
    }

    async fn fetch(&self, topic: &Topic, limit: usize) -> Result<Vec<Candidate>, ProviderFailure> {
        let query = topic_query(CATEGORY_QUERIES, topic);
        let max = limit.clamp(1, MAX_PAGE_SIZE).to_string();
        let request = self.client.get(format!("{}/search", self.base_url)).query(&[
            ("q", query.as_str()),
            ("lang", "en"),
            ("country", "us"),
            ("max", max.as_str()),
            ("apikey", self.api_key.as_str()),
        ]);

        let body: GNewsResponse = send_json(request, RATE_LIMIT_STATUSES).await?;
        let fetched_at = Utc::now();

        let candidates = body
            .articles
            .into_iter()
            .filter_map(|a| {
                let published = parse_timestamp(a.published_at.as_deref(), fetched_at);
                build_candidate(
                    a.title,
                    a.url,
                    published,
                    topic,
                    a.source.and_then(|s| s.name),
                    self.name(),
                )
                .map(|c| c.with_description(a.description).with_image_url(a.image))
            })
            .take(limit)
            .collect();
        Ok(candidates)
    }
}
