//! OAuth web flow: consent redirect, callback exchange, manual token
//! entry, and token deletion.

use std::sync::Arc;

use axum::Form;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use super::AppState;
use crate::token_file;

/// Redirect the operator to the Netatmo consent page.
pub async fn authorize(State(state): State<Arc<AppState>>) -> Response {
    let nonce = Uuid::new_v4().to_string();
    *state
        .pending_auth_state
        .lock()
        .expect("auth state lock poisoned") = Some(nonce.clone());

    match state
        .auth
        .authorize_url(&state.settings.redirect_uri(), &nonce)
    {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(err) => {
            error!(error = %err, "failed to build authorize URL");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to build authorize URL",
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Handle the redirect back from Netatmo: verify the state nonce and
/// exchange the code for a token.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if query.error.is_some() {
        return (StatusCode::BAD_REQUEST, "User did not accept.").into_response();
    }

    let expected = state
        .pending_auth_state
        .lock()
        .expect("auth state lock poisoned")
        .take();
    if expected.is_none() || query.state != expected {
        return (StatusCode::BAD_REQUEST, "OAuth state mismatch.").into_response();
    }

    let Some(code) = query.code else {
        return (StatusCode::BAD_REQUEST, "Missing authorization code.").into_response();
    };

    match state
        .auth
        .exchange_code(&code, &state.settings.redirect_uri())
        .await
    {
        Ok(()) => {
            info!("Successfully authenticated and created new token via OAuth");
            Redirect::to("/").into_response()
        }
        Err(err) => (
            StatusCode::BAD_REQUEST,
            format!("Error processing code: {err}"),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetTokenForm {
    refresh_token: String,
}

/// Manual bootstrap: accept a bare refresh token from the status page.
pub async fn set_token(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SetTokenForm>,
) -> Response {
    if form.refresh_token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "The refresh token can not be empty. Please go back.",
        )
            .into_response();
    }

    state
        .auth
        .set_refresh_token(SecretString::from(form.refresh_token));
    info!("Successfully set new token manually via refresh token");
    Redirect::to("/").into_response()
}

/// Drop the token from memory and remove the token file, so no old token
/// is restored on the next start.
pub async fn delete_token(State(state): State<Arc<AppState>>) -> Response {
    if let Some(ref path) = state.settings.token_file {
        if let Err(err) = token_file::delete_token(path) {
            error!(error = %err, path = %path.display(), "failed to delete token file");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete token file",
            )
                .into_response();
        }
        info!(path = %path.display(), "token file deleted or already absent");
    }

    state.auth.clear();
    info!("Token cleared from memory. Re-authenticate to create a new token.");
    Redirect::to("/").into_response()
}
