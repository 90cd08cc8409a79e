use thiserror::Error;

/// Top-level error type for the `nimbly-api` crate.
///
/// Covers every failure mode across the API surfaces: token handling,
/// transport, upstream status errors, and payload decoding.
/// `nimbly-core` maps these into refresh bookkeeping without distinguishing
/// between them.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// No token material is available at all. The exporter needs to be
    /// authenticated through the web flow (or a restored token file) first.
    #[error("Not authenticated -- no token available")]
    NotAuthenticated,

    /// The token endpoint rejected a grant (bad client credentials,
    /// revoked refresh token, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Upstream API ────────────────────────────────────────────────
    /// Non-success response from the Netatmo API, with the error message
    /// parsed from the `{"error": {...}}` envelope when present.
    #[error("Netatmo API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means no valid credential exists and
    /// re-authentication is required before any fetch can succeed.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::Authentication { .. } | Self::Api { status: 401, .. }
        )
    }

    /// Returns `true` if this is a transient transport error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
