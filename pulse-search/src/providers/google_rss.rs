//! Google News RSS provider. Needs no API key, so it is the provider of
//! last resort in the default priority order.

use async_trait::async_trait;
use chrono::Utc;
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{build_candidate, parse_timestamp, summarize_description, topic_query};
use crate::http::{send_text, RATE_LIMIT_STATUSES};
use crate::provider::{NewsProvider, ProviderFailure};
use crate::types::{Candidate, Topic};

pub const DEFAULT_BASE_URL: &str = "https://news.google.com/rss";
/// No published quota.
pub const DEFAULT_DAILY_LIMIT: u32 = 0;

const CATEGORY_QUERIES: &[(&str, &str)] = &[
    ("ai", "artificial intelligence OR machine learning"),
    ("data-security", "data security OR cybersecurity OR data breach"),
    ("data-governance", "data governance OR data management"),
    ("data-privacy", "data privacy OR GDPR OR privacy regulation"),
    ("data-engineering", "data engineering OR data pipeline OR big data"),
    ("business-intelligence", "business intelligence OR BI tools"),
    ("business-analytics", "business analytics"),
    ("customer-data-platform", "customer data platform OR CDP"),
    ("data-centers", "data centers OR data centre"),
    ("cloud-computing", "cloud computing OR AWS OR Azure OR Google Cloud"),
    ("magazines", "technology"),
    ("data-laws", "data privacy law OR GDPR OR CCPA OR AI Regulation"),
];

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source: Option<Source>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Source {
    #[serde(rename = "$text")]
    name: Option<String>,
}

pub struct GoogleRssProvider {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleRssProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

/// Parse an RSS 2.0 document into candidates.
///
/// `provider` is the source used for items without a `<source>` element.
pub(crate) fn parse_feed(
    xml: &str,
    topic: &Topic,
    provider: &str,
    limit: usize,
) -> Result<Vec<Candidate>, ProviderFailure> {
    let rss: Rss = from_str(xml)
        .map_err(|e| ProviderFailure::ServerError(format!("malformed RSS: {e}")))?;
    let fetched_at = Utc::now();

    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let published = parse_timestamp(item.pub_date.as_deref(), fetched_at);
            let source = item.source.and_then(|s| s.name);
            let description = item.description.as_deref().and_then(summarize_description);
            build_candidate(item.title, item.link, published, topic, source, provider)
                .map(|c| c.with_description(description))
        })
        .take(limit)
        .collect())
}

#[async_trait]
impl NewsProvider for GoogleRssProvider {
    fn name(&self) -> &str {
        "google_rss"
    }

    async fn fetch(&self, topic: &Topic, limit: usize) -> Result<Vec<Candidate>, ProviderFailure> {
        let query = topic_query(CATEGORY_QUERIES, topic);
        let request = self.client.get(format!("{}/search", self.base_url)).query(&[
            ("q", query.as_str()),
            ("hl", "en-US"),
            ("gl", "US"),
            ("ceid", "US:en"),
        ]);
        let xml = send_text(request, RATE_LIMIT_STATUSES).await?;
        parse_feed(&xml, topic, self.name(), limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>"artificial intelligence" - Google News</title>
    <item>
      <title>Chip makers race ahead - Wire</title>
      <link>https://news.example.com/chips?utm_source=gn</link>
      <guid isPermaLink="false">abc</guid>
      <pubDate>Sat, 01 Mar 2025 10:30:00 GMT</pubDate>
      <source url="https://wire.example.com">Wire</source>
    </item>
    <item>
      <title>No link here</title>
      <pubDate>Sat, 01 Mar 2025 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Models get smaller</title>
      <link>https://other.example.com/models</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_with_link_and_title() {
        let topic = Topic::Category("ai".into());
        let items = parse_feed(FEED, &topic, "google_rss", 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Chip makers race ahead - Wire");
        assert_eq!(items[0].source, "Wire");
        assert_eq!(items[0].category, "ai");
        assert_eq!(items[0].published_at.to_rfc3339(), "2025-03-01T10:30:00+00:00");
        assert_eq!(items[1].source, "google_rss");
        assert!(items[0].description.is_none());
    }

    #[test]
    fn description_is_summarised() {
        let xml = r#"<rss><channel><item>
            <title>Launch</title>
            <link>https://blog.example.com/launch</link>
            <description><![CDATA[<p>Now <a href="/x">available</a>
                in all regions.</p>]]></description>
        </item></channel></rss>"#;
        let items = parse_feed(xml, &Topic::Category("cloud-aws".into()), "AWS", 10).unwrap();
        assert_eq!(items[0].description.as_deref(), Some("Now available in all regions."));
        assert_eq!(items[0].source, "AWS");
    }

    #[test]
    fn respects_limit() {
        let topic = Topic::Query("chips".into());
        let items = parse_feed(FEED, &topic, "google_rss", 1).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, "search");
    }

    #[test]
    fn empty_channel_yields_no_items() {
        let xml = "<rss><channel><title>empty</title></channel></rss>";
        let items = parse_feed(xml, &Topic::Category("ai".into()), "google_rss", 10).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn malformed_xml_is_a_server_error() {
        let topic = Topic::Category("ai".into());
        let err = parse_feed("<html>blocked", &topic, "google_rss", 10).unwrap_err();
        assert!(matches!(err, ProviderFailure::ServerError(_)));
    }
}
