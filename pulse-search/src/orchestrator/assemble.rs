//! Result assembly: trim, round, and shape ranked results for output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ranking::hours_elapsed;
use crate::types::RankedResult;

/// A ranked result as it leaves the service.
///
/// Scores are rounded to four decimals and `hours_old` to one, so a cached
/// copy serialises byte-for-byte like the response that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledResult {
    pub id: String,
    pub title: String,
    pub url: String,
    pub dedup_key: String,
    pub source: String,
    pub category: String,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub likes: u64,
    pub views: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_cloud_news: bool,
    #[serde(default)]
    pub cloud_provider: Option<String>,
    pub relevance_score: f64,
    pub time_decay: f64,
    pub engagement_boost: f64,
    pub final_score: f64,
    pub hours_old: f64,
}

/// Trim ranked results to `limit` and shape them for output.
///
/// `ranked` must already be sorted; order is preserved.
pub fn assemble(
    ranked: Vec<RankedResult>,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<AssembledResult> {
    ranked
        .into_iter()
        .take(limit)
        .map(|r| {
            let c = r.candidate;
            AssembledResult {
                hours_old: round_to(hours_elapsed(c.published_at, now), 1),
                id: c.id,
                title: c.title,
                url: c.url,
                dedup_key: c.dedup_key,
                source: c.source,
                category: c.category,
                published_at: c.published_at,
                description: c.description,
                image_url: c.image_url,
                likes: c.likes,
                views: c.views,
                tags: c.tags,
                is_cloud_news: c.is_cloud_news,
                cloud_provider: c.cloud_provider,
                relevance_score: round_to(r.relevance, 4),
                time_decay: round_to(r.time_decay, 4),
                engagement_boost: round_to(r.engagement_boost, 4),
                final_score: round_to(r.final_score, 4),
            }
        })
        .collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
