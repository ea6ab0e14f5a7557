//! Error types for the Pulse service.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pulse_search::SearchError;
use serde_json::json;

/// Start-up and configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Engine construction error.
    #[error(transparent)]
    Engine(#[from] SearchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// A request failure rendered as a JSON error body.
#[derive(Debug)]
pub struct ApiError(pub SearchError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SearchError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            SearchError::AllProvidersExhausted { .. }
            | SearchError::RetrievalIndexUnavailable(_)
            | SearchError::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.0.code(), error = %self.0, "request failed");
        }
        let mut body = json!({
            "success": false,
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        if let SearchError::AllProvidersExhausted { attempts } = &self.0 {
            body["attempts"] = json!(attempts);
        }
        (status, Json(body)).into_response()
    }
}
