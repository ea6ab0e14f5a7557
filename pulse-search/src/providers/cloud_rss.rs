//! Cloud vendor blog feeds (AWS, Google Cloud, Azure, ...).
//!
//! Each vendor publishes a plain RSS 2.0 feed. One [`CloudRssProvider`]
//! serves one feed, reusing the Google News RSS parser. Articles come back
//! tagged as cloud news with the vendor's slug, in category `cloud-{slug}`.

use async_trait::async_trait;

use super::google_rss::parse_feed;
use crate::http::{send_text, RATE_LIMIT_STATUSES};
use crate::provider::{NewsProvider, ProviderFailure};
use crate::types::{Candidate, Topic};

/// Vendor slug and feed URL for every built-in feed.
pub const DEFAULT_FEEDS: &[(&str, &str)] = &[
    ("aws", "https://aws.amazon.com/blogs/aws/feed/"),
    ("gcp", "https://cloudblog.withgoogle.com/rss/"),
    ("azure", "https://azure.microsoft.com/en-us/blog/feed/"),
    ("ibm", "https://www.ibm.com/blog/rss"),
    ("oracle", "https://blogs.oracle.com/cloud-infrastructure/rss"),
    ("digitalocean", "https://www.digitalocean.com/blog/rss.xml"),
];

/// Articles kept per feed.
pub const FEED_LIMIT: usize = 20;

pub struct CloudRssProvider {
    client: reqwest::Client,
    cloud: String,
    name: String,
    feed_url: String,
}

impl CloudRssProvider {
    /// `cloud` is lowercased and becomes part of the provider name.
    pub fn new(client: reqwest::Client, cloud: &str, feed_url: impl Into<String>) -> Self {
        let cloud = cloud.trim().to_lowercase();
        Self {
            client,
            name: format!("{cloud}_rss"),
            cloud,
            feed_url: feed_url.into(),
        }
    }

    /// One provider per entry in [`DEFAULT_FEEDS`].
    pub fn defaults(client: &reqwest::Client) -> Vec<Self> {
        DEFAULT_FEEDS
            .iter()
            .map(|(cloud, url)| Self::new(client.clone(), cloud, *url))
            .collect()
    }

    /// Lowercase vendor slug, e.g. `aws`.
    pub fn cloud(&self) -> &str {
        &self.cloud
    }

    /// Category the feed's articles are filed under.
    pub fn category(&self) -> String {
        format!("cloud-{}", self.cloud)
    }
}

#[async_trait]
impl NewsProvider for CloudRssProvider {
    fn name(&self) -> &str {
        &self.name
    }

    /// The feed is fixed, so `topic` only labels the results.
    async fn fetch(&self, topic: &Topic, limit: usize) -> Result<Vec<Candidate>, ProviderFailure> {
        let request = self.client.get(&self.feed_url);
        let xml = send_text(request, RATE_LIMIT_STATUSES).await?;
        let source = self.cloud.to_uppercase();
        Ok(parse_feed(&xml, topic, &source, limit)?
            .into_iter()
            .map(|c| c.with_cloud_provider(&self.cloud))
            .collect())
    }
}
