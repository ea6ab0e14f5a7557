//! Shared HTTP plumbing for upstream providers.
//!
//! Builds the [`reqwest::Client`] every provider uses and turns transport
//! errors and status codes into [`ProviderFailure`] values.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::SearchError;
use crate::provider::ProviderFailure;

const USER_AGENT: &str = concat!("pulse-search/", env!("CARGO_PKG_VERSION"));

/// Statuses every provider treats as rate limiting.
pub const RATE_LIMIT_STATUSES: &[u16] = &[429];

/// Build a [`reqwest::Client`] with the given request timeout.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if the client cannot be constructed.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))
}

/// Send a request and map failures onto the provider outcome set.
///
/// `rate_limit_statuses` lists the status codes this upstream uses for
/// quota exhaustion (always including 429).
pub async fn send(
    request: RequestBuilder,
    rate_limit_statuses: &[u16],
) -> Result<Response, ProviderFailure> {
    let response = request.send().await.map_err(map_transport_error)?;
    classify_status(response, rate_limit_statuses)
}

/// Send a request and decode a JSON body.
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    rate_limit_statuses: &[u16],
) -> Result<T, ProviderFailure> {
    let response = send(request, rate_limit_statuses).await?;
    response.json::<T>().await.map_err(map_body_error)
}

/// Send a request and read the body as text.
pub async fn send_text(
    request: RequestBuilder,
    rate_limit_statuses: &[u16],
) -> Result<String, ProviderFailure> {
    let response = send(request, rate_limit_statuses).await?;
    response.text().await.map_err(map_body_error)
}

fn classify_status(
    response: Response,
    rate_limit_statuses: &[u16],
) -> Result<Response, ProviderFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if rate_limit_statuses.contains(&status.as_u16()) || status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Err(ProviderFailure::RateLimited { retry_after });
    }
    Err(ProviderFailure::ServerError(format!("HTTP {}", status.as_u16())))
}

// Request URLs carry API keys in their query strings, so messages drop them.
fn map_transport_error(err: reqwest::Error) -> ProviderFailure {
    if err.is_timeout() {
        ProviderFailure::Timeout
    } else {
        ProviderFailure::ServerError(format!("request failed: {}", err.without_url()))
    }
}

fn map_body_error(err: reqwest::Error) -> ProviderFailure {
    if err.is_timeout() {
        ProviderFailure::Timeout
    } else {
        ProviderFailure::ServerError(format!("malformed payload: {}", err.without_url()))
    }
}

/// Parse a `Retry-After` value given in delta-seconds.
///
/// HTTP-date values are not honoured and fall back to the tracker's backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
