use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::metrics::render_metrics;
use crate::server::AppState;

pub async fn healthz(State(state): State<AppState>) -> Response {
    let store = state.cache.store();
    match store.ping().await {
        Ok(()) => Json(json!({ "status": "ok", "backend": store.backend_name() })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "backend": store.backend_name(),
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

pub async fn metrics() -> Response {
    match render_metrics() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}
