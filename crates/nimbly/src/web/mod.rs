//! HTTP surface of the exporter: metrics endpoints, status page, OAuth
//! flow, and debug views.

mod debug;
mod home;
mod oauth;

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use tower_http::trace::TraceLayer;
use tracing::error;

use nimbly_api::OAuthClient;
use nimbly_config::Settings;
use nimbly_core::{Aggregator, LabelSchema};

use crate::metrics::MetricsView;

/// Shared application state.
pub struct AppState {
    pub aggregator: Aggregator,
    pub auth: Arc<OAuthClient>,
    pub settings: Settings,
    pub v1: MetricsView,
    pub v2: MetricsView,
    /// Nonce for the in-flight OAuth authorization, if any.
    pub pending_auth_state: Mutex<Option<String>>,
}

/// Create the Axum router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/", get(home::home))
        .route("/metrics/v1", get(metrics_v1))
        .route("/metrics/v2", get(metrics_v2))
        .route("/version", get(version))
        .route("/auth/authorize", get(oauth::authorize))
        .route("/auth/callback", get(oauth::callback))
        .route("/auth/settoken", post(oauth::set_token))
        .route("/auth/deletetoken", post(oauth::delete_token));

    if state.settings.debug_handlers {
        app = app
            .route("/debug/data", get(debug::debug_data))
            .route("/debug/token", get(debug::debug_token));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn metrics_v1(State(state): State<Arc<AppState>>) -> Response {
    serve_metrics(&state, LabelSchema::PerSource).await
}

async fn metrics_v2(State(state): State<Arc<AppState>>) -> Response {
    serve_metrics(&state, LabelSchema::Unified).await
}

/// One scrape: trigger due refreshes (without waiting on them), project
/// the current snapshots, and encode. A scrape during an upstream outage
/// still returns 200 with the cached, non-expired data plus up=0.
async fn serve_metrics(state: &AppState, schema: LabelSchema) -> Response {
    let collection = state.aggregator.collect(Utc::now(), schema);
    let view = match schema {
        LabelSchema::PerSource => &state.v1,
        LabelSchema::Unified => &state.v2,
    };
    let token = state.auth.current();

    match view.render(&collection, token.as_ref()).await {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

async fn version() -> String {
    format!("nimbly {}", env!("CARGO_PKG_VERSION"))
}
