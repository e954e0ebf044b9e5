//! Admin API error responses.
//!
//! Every error renders as `{"error": <stable message>, "details": ...}` so
//! dashboards and scripts can match on `error` without parsing prose.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tagcache::{CacheError, KeyFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Backing store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Partial invalidation: {succeeded} succeeded, {} failed", .failed.len())]
    PartialInvalidation {
        succeeded: u64,
        failed: Vec<KeyFailure>,
    },
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::StoreUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::PartialInvalidation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable, machine-matchable message for the `error` field.
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad request",
            ApiError::NotFound(_) => "not found",
            ApiError::RateLimited { .. } => "rate limit exceeded",
            ApiError::StoreUnavailable(_) => "backing store unavailable",
            ApiError::PartialInvalidation { .. } => "partial invalidation",
            ApiError::Internal(_) => "internal error",
        }
    }

    fn details(&self) -> Value {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::StoreUnavailable(msg)
            | ApiError::Internal(msg) => Value::String(msg.clone()),
            ApiError::RateLimited { retry_after_secs } => {
                json!({ "retryAfterSecs": retry_after_secs })
            }
            ApiError::PartialInvalidation { succeeded, failed } => json!({
                "succeeded": succeeded,
                "failed": failed
                    .iter()
                    .map(|f| json!({ "key": f.key, "reason": f.reason }))
                    .collect::<Vec<_>>(),
            }),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Store(e) => ApiError::StoreUnavailable(e.to_string()),
            CacheError::PartialInvalidation { succeeded, failed } => {
                ApiError::PartialInvalidation { succeeded, failed }
            }
            e @ (CacheError::InvalidKey(_) | CacheError::InvalidTtl) => {
                ApiError::BadRequest(e.to_string())
            }
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "admin request failed");
        } else {
            tracing::debug!(error = %self, "admin request rejected");
        }

        let body = json!({ "error": self.message(), "details": self.details() });
        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
