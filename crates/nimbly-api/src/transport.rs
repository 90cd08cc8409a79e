// Shared transport configuration for building reqwest::Client instances.
//
// The OAuth, weather, and Home Coach clients share timeout and user-agent
// settings through this module, avoiding duplicated builder logic.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::Error;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("nimbly/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::from)
    }
}

// ── Response envelope handling ──────────────────────────────────────

/// Error response shape from the Netatmo API.
#[derive(serde::Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

/// Decode a JSON response body, mapping non-success statuses to
/// [`Error::Api`] (with the message from the Netatmo error envelope when it
/// parses) and decode failures to [`Error::Deserialization`].
pub(crate) async fn handle_json_response<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .map_or_else(
                || body.trim().to_owned(),
                |e| {
                    let msg = e.error.message.unwrap_or_else(|| "unknown error".into());
                    match e.error.code {
                        Some(code) => format!("{msg} (code {code})"),
                        None => msg,
                    }
                },
            );
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
