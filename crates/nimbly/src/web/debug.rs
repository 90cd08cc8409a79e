//! Debug views for operator troubleshooting.
//!
//! Both endpoints are pure reads over the cache and the held token --
//! they never trigger a refresh or an upstream call. When one source is
//! failing while another succeeds, the data view degrades per source
//! instead of failing whole.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;

use super::AppState;

/// Current raw snapshot plus refresh bookkeeping, keyed by source.
pub async fn debug_data(State(state): State<Arc<AppState>>) -> Response {
    let states = state.aggregator.states();

    let mut body = serde_json::Map::new();
    let mut failing = 0usize;

    for (kind, source_state) in &states {
        if source_state.last_error.is_some() {
            failing += 1;
        }
        body.insert(
            kind.as_str().to_owned(),
            json!({
                "error": source_state.last_error,
                "last_refresh": source_state.last_attempt,
                "cache_updated": source_state.last_success,
                "devices": source_state.snapshot.as_ref().map(|s| &s.readings),
            }),
        );
    }

    let status = if !states.is_empty() && failing == states.len() {
        StatusCode::BAD_GATEWAY
    } else if failing > 0 {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    (status, Json(serde_json::Value::Object(body))).into_response()
}

/// Information about the currently held token, without secret material.
pub async fn debug_token(State(state): State<Arc<AppState>>) -> Response {
    let Some(token) = state.auth.current() else {
        return (StatusCode::NOT_FOUND, "No token available.").into_response();
    };

    Json(json!({
        "isValid": token.is_valid(Utc::now()),
        "hasAccessToken": token.access_token.is_some(),
        "hasRefreshToken": token.refresh_token.is_some(),
        "expiry": token.expires_at,
    }))
    .into_response()
}
