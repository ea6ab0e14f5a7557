//! Qdrant-backed [`VectorIndex`].
//!
//! The collection uses cosine similarity; distance is reported as
//! `1 - score`. Point payloads carry the article metadata:
//!
//! | field            | type          |
//! |------------------|---------------|
//! | `title`, `url`   | string        |
//! | `source`         | string        |
//! | `category`       | string        |
//! | `published_at`   | RFC 3339      |
//! | `published_ts`   | unix seconds  |
//! | `likes`, `views` | integer       |
//! | `tags`           | string list, or comma-separated string |
//! | `cloud_provider` | string        |
//! | `is_cloud_news`  | bool          |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{Condition, Filter, Range, ScoredPoint, SearchPointsBuilder};
use qdrant_client::Qdrant;

use super::{IndexError, VectorIndex};
use crate::types::{Candidate, SearchFilters};

#[derive(Clone)]
pub struct QdrantIndex {
    client: Qdrant,
    url: String,
    collection: String,
}

impl QdrantIndex {
    /// Build a client for `url`. No connection is made until the first query.
    pub fn new(url: &str, collection: impl Into<String>) -> Result<Self, IndexError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| IndexError::Unreachable(format!("{url}: {e}")))?;
        Ok(Self {
            client,
            url: url.to_owned(),
            collection: collection.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn health_check(&self) -> Result<(), IndexError> {
        self.client
            .health_check()
            .await
            .map_err(|e| IndexError::Unreachable(format!("{}: {e}", self.url)))?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn query(
        &self,
        embedding: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Candidate>, IndexError> {
        let mut search =
            SearchPointsBuilder::new(&self.collection, embedding.to_vec(), limit as u64)
                .with_payload(true);
        let conditions = build_conditions(filters);
        if !conditions.is_empty() {
            search = search.filter(Filter::must(conditions));
        }

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| IndexError::Query(format!("collection {}: {e}", self.collection)))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(candidate_from_point)
            .collect())
    }
}

/// Translate filters into exact-match and range conditions.
pub(crate) fn build_conditions(filters: &SearchFilters) -> Vec<Condition> {
    let mut conditions = Vec::new();
    if let Some(category) = &filters.category {
        conditions.push(Condition::matches("category", category.clone()));
    }
    if let Some(source) = &filters.source {
        conditions.push(Condition::matches("source", source.clone()));
    }
    if let Some(provider) = &filters.cloud_provider {
        conditions.push(Condition::matches("cloud_provider", provider.clone()));
        conditions.push(Condition::matches("is_cloud_news", true));
    }
    for tag in &filters.tags {
        conditions.push(Condition::matches("tags", tag.clone()));
    }
    if let Some(after) = filters.published_after {
        conditions.push(Condition::range(
            "published_ts",
            Range {
                gte: Some(after.timestamp() as f64),
                ..Default::default()
            },
        ));
    }
    conditions
}

/// Convert a scored point into a candidate. Points without a title or URL
/// are dropped.
pub(crate) fn candidate_from_point(point: ScoredPoint) -> Option<Candidate> {
    let id = match point.id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u,
        None => return None,
    };
    let payload = point.payload;
    let text = |field: &str| payload.get(field).and_then(|v| v.as_str()).map(|s| s.to_string());
    let count = |field: &str| {
        payload
            .get(field)
            .and_then(|v| v.as_integer())
            .map_or(0, |n| n.max(0) as u64)
    };

    let title = text("title")?;
    let url = text("url")?;
    let published_at = text("published_at")
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|| {
            payload
                .get("published_ts")
                .and_then(|v| v.as_integer())
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
        })?;

    let distance = (1.0 - f64::from(point.score)).max(0.0);

    let tags: Vec<String> = match payload.get("tags") {
        Some(v) => match (v.as_list(), v.as_str()) {
            (Some(list), _) => list.iter().filter_map(|t| t.as_str().cloned()).collect(),
            (None, Some(joined)) => joined.split(',').map(str::to_owned).collect(),
            (None, None) => Vec::new(),
        },
        None => Vec::new(),
    };

    let mut candidate = Candidate::new(title, url, published_at)
        .with_id(id)
        .with_category(text("category").unwrap_or_default())
        .with_source(text("source").unwrap_or_default())
        .with_distance(distance)
        .with_engagement(count("likes"), count("views"))
        .with_description(text("description"))
        .with_image_url(text("image_url"))
        .with_tags(tags);
    if let Some(provider) = text("cloud_provider").filter(|p| !p.trim().is_empty()) {
        candidate = candidate.with_cloud_provider(provider);
    }
    if let Some(flag) = payload.get("is_cloud_news").and_then(|v| v.as_bool()) {
        candidate.is_cloud_news = flag;
    }
    Some(candidate)
}
