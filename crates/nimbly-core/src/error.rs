// ── Core error types ──
//
// Refresh-level errors from nimbly-core. Consumers never see HTTP status
// codes or JSON parse failures directly -- the `From<nimbly_api::Error>`
// impl folds transport-layer errors into domain-appropriate variants.
// None of these are process-fatal: the refresh cache records them and
// keeps serving the previous snapshot.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No usable credential, or the credential was rejected upstream.
    /// Data source activity is impossible until re-authentication.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The upstream fetch failed (transport, status, or decoding).
    #[error("Upstream fetch failed: {message}")]
    FetchFailed { message: String },
}

impl From<nimbly_api::Error> for CoreError {
    fn from(err: nimbly_api::Error) -> Self {
        if err.is_auth_error() {
            Self::AuthenticationFailed {
                message: err.to_string(),
            }
        } else {
            Self::FetchFailed {
                message: err.to_string(),
            }
        }
    }
}
