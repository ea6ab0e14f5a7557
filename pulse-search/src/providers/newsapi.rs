//! NewsAPI `everything` endpoint provider.
//!
//! NewsAPI signals quota exhaustion with 426 on developer plans as well
//! as 429, so both count as rate limiting.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{build_candidate, parse_timestamp, topic_query};
use crate::http::send_json;
use crate::provider::{NewsProvider, ProviderFailure};
use crate::redact::RedactedString;
use crate::types::{Candidate, Topic};

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";
/// Developer plan allowance.
pub const DEFAULT_DAILY_LIMIT: u32 = 100;

const RATE_LIMIT_STATUSES: &[u16] = &[426, 429];
const MAX_PAGE_SIZE: usize = 100;

const CATEGORY_QUERIES: &[(&str, &str)] = &[
    ("ai", "artificial intelligence OR \"machine learning\" OR \"deep learning\""),
    ("data-security", "\"data security\" OR cybersecurity OR \"data breach\""),
    ("data-governance", "\"data governance\" OR \"data management\" OR compliance"),
    ("data-privacy", "\"data privacy\" OR GDPR OR \"privacy regulation\""),
    ("data-engineering", "\"data engineering\" OR \"data pipeline\" OR \"big data\""),
    ("business-intelligence", "\"business intelligence\" OR \"BI tools\""),
    ("business-analytics", "\"business analytics\" OR analytics"),
    ("customer-data-platform", "\"customer data platform\" OR CDP"),
    ("data-centers", "\"data centers\" OR \"data centre\""),
    ("cloud-computing", "\"cloud computing\" OR AWS OR Azure OR \"Google Cloud\""),
    ("magazines", "technology"),
    ("data-laws", "\"data privacy law\" OR GDPR OR CCPA OR \"EU AI Act\""),
];

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    source: Option<NewsApiSource>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

pub struct NewsApiProvider {
    client: reqwest::Client,
    api_key: RedactedString,
    base_url: String,
}

impl NewsApiProvider {
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
impl NewsProvider for NewsApiProvider {
    fn name(&self) -> &str {
        "newsapi"
    }

    async fn fetch(&self, topic: &Topic, limit: usize) -> Result<Vec<Candidate>, ProviderFailure> {
        let query = topic_query(CATEGORY_QUERIES, topic);
        let page_size = limit.clamp(1, MAX_PAGE_SIZE).to_string();
        let request = self
            .client
            .get(format!("{}/everything", self.base_url))
            .query(&[
                ("q", query.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ]);

        let body: NewsApiResponse = send_json(request, RATE_LIMIT_STATUSES).await?;
        let fetched_at = Utc::now();

        Ok(body
            .articles
            .into_iter()
            // Removed articles come back as "[Removed]" placeholders.
            .filter(|a| a.title.as_deref() != Some("[Removed]"))
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
                .map(|c| c.with_description(a.description).with_image_url(a.url_to_image))
            })
            .take(limit)
            .collect())
    }
}
