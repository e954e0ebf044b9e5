//! Request middleware: per-client admin rate limiting and request metrics.
//!
//! The rate limiter fails open. A store outage is logged and the request
//! goes through without limit headers.

use axum::extract::{MatchedPath, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::{body::Body, http::Request, middleware::Next, response::IntoResponse, response::Response};

use crate::error::ApiError;
use crate::metrics::record_admin_request;
use crate::server::AppState;

const ADMIN_ACTION: &str = "admin";
const ANONYMOUS: &str = "anonymous";

/// Client identity for rate limiting: the first `x-forwarded-for` hop, or
/// `anonymous` when absent.
pub fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string()
}

// Fixed-window limit on admin routes. Fails open: if the store cannot count
// the request, it is let through and the outage is logged.
pub async fn admin_rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let settings = &state.config.rate_limit;
    if !settings.enabled {
        return next.run(req).await;
    }

    let identity = client_identity(req.headers());
    match state
        .limiter
        .allow(
            &identity,
            ADMIN_ACTION,
            settings.admin_requests_per_window,
            settings.window_secs,
        )
        .await
    {
        Ok(decision) if decision.allowed => {
            let mut res = next.run(req).await;
            let headers = res.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(decision.limit),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(decision.remaining),
            );
            res
        }
        Ok(decision) => {
            tracing::warn!(identity = %identity, count = decision.count, "admin request rate limited");
            ApiError::RateLimited {
                retry_after_secs: decision.window_secs,
            }
            .into_response()
        }
        Err(e) => {
            tracing::warn!(identity = %identity, error = %e, "rate limiter unavailable, allowing request");
            next.run(req).await
        }
    }
}

/// Counts requests per matched route and status class.
pub async fn request_metrics(req: Request<Body>, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let res = next.run(req).await;
    record_admin_request(&route, res.status().as_u16());
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_uses_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers), "anonymous");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_identity(&headers), "203.0.113.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 10.0.0.1"));
        assert_eq!(client_identity(&headers), "anonymous");
    }
}
