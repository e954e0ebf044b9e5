//! Administrative cache endpoints.
//!
//! All routes here sit behind the admin rate limiter.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde::Deserialize;
use serde_json::{Value, json};
use tagcache::StatsReport;

use crate::error::ApiError;
use crate::middleware::admin_rate_limit;
use crate::server::AppState;

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/cache/stats", get(cache_stats))
        .route("/admin/cache/invalidate-all", post(invalidate_all))
        .route("/admin/cache/reset-stats", post(reset_stats))
        .route("/admin/cache/invalidate/tag/{tag}", post(invalidate_tag))
        .route("/admin/cache/invalidate/prefix/{prefix}", post(invalidate_prefix))
        .route(
            "/admin/cache/keys/{key}",
            get(peek_key).put(put_key).delete(delete_key),
        )
        .route_layer(middleware::from_fn_with_state(state, admin_rate_limit))
}

async fn cache_stats(State(state): State<AppState>) -> Result<Json<StatsReport>, ApiError> {
    Ok(Json(state.stats().report().await?))
}

async fn invalidate_all(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let invalidated = state.cache.invalidate_all().await?;
    tracing::info!(invalidated, "all cache entries invalidated via admin API");
    Ok(Json(json!({ "invalidated": invalidated })))
}

async fn reset_stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.stats().reset().await?;
    Ok(Json(json!({ "reset": true })))
}

async fn invalidate_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let invalidated = state.cache.invalidate_tag(&tag).await?;
    Ok(Json(json!({ "tag": tag, "invalidated": invalidated })))
}

async fn invalidate_prefix(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let invalidated = state.cache.invalidate_pattern(&prefix).await?;
    Ok(Json(json!({ "prefix": prefix, "invalidated": invalidated })))
}

async fn peek_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.cache.peek_entry::<Value>(&key).await? {
        Some((value, meta)) => Ok(Json(json!({ "key": key, "value": value, "meta": meta }))),
        None => Err(ApiError::not_found(format!("no cached entry for '{key}'"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutKeyRequest {
    value: Value,
    #[serde(default)]
    ttl_secs: Option<u64>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

async fn put_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<PutKeyRequest>,
) -> Result<Json<Value>, ApiError> {
    let ttl_secs = body
        .ttl_secs
        .unwrap_or(state.config.cache.default_ttl_secs);
    state
        .cache
        .set(&key, &body.value, ttl_secs, &body.tags)
        .await?;
    Ok(Json(json!({ "key": key, "ttlSecs": ttl_secs, "tags": body.tags })))
}

async fn delete_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.cache.invalidate_key(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
