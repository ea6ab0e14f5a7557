//! Core types: candidates, ranked results, topics and search filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::orchestrator::url_normalize::dedup_key;

/// A piece of content produced by a provider call or by the vector index.
///
/// Immutable once produced; the ranking engine wraps it in a
/// [`RankedResult`] rather than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable identity (index point id, or the dedup key for provider articles).
    pub id: String,
    pub title: String,
    /// URL as returned by the upstream.
    pub url: String,
    /// First 16 hex chars of the SHA-256 of the canonical URL.
    pub dedup_key: String,
    pub published_at: DateTime<Utc>,
    pub category: String,
    /// Publisher name, or the provider name when the upstream has none.
    pub source: String,
    /// Raw similarity distance, only on the search path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Lowercased topic tags from the index payload.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Set for articles from a cloud vendor's own blog feed.
    #[serde(default)]
    pub is_cloud_news: bool,
    /// Lowercased cloud vendor (`aws`, `gcp`, ...) when `is_cloud_news`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
}

impl Candidate {
    /// Build a candidate from the fields every upstream provides.
    ///
    /// The dedup key is derived from `url`, and the id defaults to it.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let url = url.into();
        let key = dedup_key(&url);
        Self {
            id: key.clone(),
            title: title.into(),
            url,
            dedup_key: key,
            published_at,
            category: String::new(),
            source: String::new(),
            distance: None,
            likes: 0,
            views: 0,
            description: None,
            image_url: None,
            tags: Vec::new(),
            is_cloud_news: false,
            cloud_provider: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_engagement(mut self, likes: u64, views: u64) -> Self {
        self.likes = likes;
        self.views = views;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Tags are trimmed and lowercased; blanks are dropped.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    /// Mark as cloud vendor news from `provider` (lowercased).
    pub fn with_cloud_provider(mut self, provider: impl AsRef<str>) -> Self {
        self.cloud_provider = Some(provider.as_ref().trim().to_lowercase());
        self.is_cloud_news = true;
        self
    }
}

/// A candidate plus the scores derived for one request. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub candidate: Candidate,
    pub relevance: f64,
    pub time_decay: f64,
    pub engagement_boost: f64,
    pub final_score: f64,
}

/// What a provider is asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A category slug such as `ai` or `cloud-aws` (news path).
    Category(String),
    /// Free text (baseline search path).
    Query(String),
}

impl Topic {
    /// The category slug, or `"search"` for free-text topics.
    pub fn category_label(&self) -> &str {
        match self {
            Self::Category(slug) => slug,
            Self::Query(_) => "search",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category(slug) => write!(f, "category:{slug}"),
            Self::Query(_) => f.write_str("query"),
        }
    }
}

/// Exact-match predicates pushed down to the vector index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub source: Option<String>,
    /// Lowercased cloud provider; also implies `is_cloud_news == true`.
    pub cloud_provider: Option<String>,
    /// Every listed tag must be present on a matching point.
    pub tags: Vec<String>,
    /// Only content published at or after this instant.
    pub published_after: Option<DateTime<Utc>>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.source.is_none()
            && self.cloud_provider.is_none()
            && self.tags.is_empty()
            && self.published_after.is_none()
    }
}
