//! Route handlers.
//!
//! Handlers parse query strings by hand so that a malformed number becomes
//! an `INVALID_QUERY` JSON error instead of axum's plain-text rejection.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use pulse_search::{
    HealthReport, NewsResponse, SearchError, SearchRequest, SearchResponse, SearchV2Response,
};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchV2Params {
    pub q: Option<String>,
    pub category: Option<String>,
    pub provider: Option<String>,
    pub limit: Option<String>,
    pub max_hours: Option<String>,
    pub decay_factor: Option<String>,
}

/// `GET /news/{category}`
pub async fn news(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<NewsResponse>, ApiError> {
    let response = state.service.news(&category).await?;
    tracing::debug!(
        category = %response.category,
        provider = %response.provider,
        cache_hit = response.cache_hit,
        count = response.count,
        "news served"
    );
    Ok(Json(response))
}

/// `GET /news/rss/{provider}`
pub async fn cloud_news(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<NewsResponse>, ApiError> {
    let response = state.service.cloud_news(&provider).await?;
    tracing::debug!(
        feed = %response.provider,
        cache_hit = response.cache_hit,
        count = response.count,
        "cloud feed served"
    );
    Ok(Json(response))
}

/// `GET /search?q=&limit=`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let limit = parse_param("limit", params.limit)?;
    let q = params.q.unwrap_or_default();
    Ok(Json(state.service.search(&q, limit).await?))
}

/// `GET /search/v2?q=&category=&provider=&limit=&max_hours=&decay_factor=`
pub async fn search_v2(
    State(state): State<AppState>,
    Query(params): Query<SearchV2Params>,
) -> Result<Json<SearchV2Response>, ApiError> {
    let request = SearchRequest {
        q: params.q.unwrap_or_default(),
        category: params.category,
        provider: params.provider,
        limit: parse_param("limit", params.limit)?,
        max_hours: parse_param("max_hours", params.max_hours)?,
        decay_factor: parse_param("decay_factor", params.decay_factor)?,
    };
    Ok(Json(state.service.search_v2(request).await?))
}

/// `GET /health`. 503 when no provider is eligible.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.service.health().await;
    let status = if report.status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Parse an optional query parameter; blank counts as absent.
fn parse_param<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, ApiError> {
    let Some(raw) = raw.map(|r| r.trim().to_owned()).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    raw.parse()
        .map(Some)
        .map_err(|_| ApiError(SearchError::InvalidQuery(format!("{name} must be a number"))))
}
