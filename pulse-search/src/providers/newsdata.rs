//! NewsData.io `news` endpoint provider.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{build_candidate, parse_timestamp, topic_query};
use crate::http::{send_json, RATE_LIMIT_STATUSES};
use crate::provider::{NewsProvider, ProviderFailure};
use crate::redact::RedactedString;
use crate::types::{Candidate, Topic};

pub const DEFAULT_BASE_URL: &str = "https://newsdata.io/api/1";
/// Free tier allowance, in credits.
pub const DEFAULT_DAILY_LIMIT: u32 = 200;

// Comma-separated keyword lists.
const CATEGORY_QUERIES: &[(&str, &str)] = &[
    ("ai", "artificial intelligence,machine learning"),
    ("data-security", "data security,cybersecurity"),
    ("data-governance", "data governance,compliance"),
    ("data-privacy", "data privacy,GDPR"),
    ("data-engineering", "data engineering,big data"),
    ("business-intelligence", "business intelligence"),
    ("business-analytics", "business analytics"),
    ("customer-data-platform", "customer data platform"),
    ("data-centers", "data centers"),
    ("cloud-computing", "cloud computing,AWS,Azure,Google Cloud"),
    ("magazines", "technology"),
    ("data-laws", "data privacy law,GDPR,CCPA,AI regulation"),
];

#[derive(Debug, Deserialize)]
struct NewsDataResponse {
    #[serde(default)]
    results: Vec<NewsDataArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsDataArticle {
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    image_url: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source_id: Option<String>,
}

pub struct NewsDataProvider {
    client: reqwest::Client,
    api_key: RedactedString,
    base_url: String,
}

impl NewsDataProvider {
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
impl NewsProvider for NewsDataProvider {
    fn name(&self) -> &str {
        "newsdata"
    }

    async fn fetch(&self, topic: &Topic, limit: usize) -> Result<Vec<Candidate>, ProviderFailure> {
        let query = topic_query(CATEGORY_QUERIES, topic);
        let request = self.client.get(format!("{}/news", self.base_url)).query(&[
            ("q", query.as_str()),
            ("language", "en"),
            ("country", "us"),
            ("apikey", self.api_key.as_str()),
        ]);

        let body: NewsDataResponse = send_json(request, RATE_LIMIT_STATUSES).await?;
        let fetched_at = Utc::now();

        Ok(body
            .results
            .into_iter()
            .filter_map(|a| {
                // pubDate is "YYYY-MM-DD HH:MM:SS" in UTC.
                let published = parse_timestamp(a.pub_date.as_deref(), fetched_at);
                build_candidate(a.title, a.link, published, topic, a.source_id, self.name())
                    .map(|c| c.with_description(a.description).with_image_url(a.image_url))
            })
            .take(limit)
            .collect())
    }
}
