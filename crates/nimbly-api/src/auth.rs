// OAuth2 token lifecycle for the Netatmo API.
//
// The exporter authenticates once through the web consent flow (or a
// restored token file) and afterwards keeps itself alive through the
// refresh-token grant. The access token rotates; the refresh token may
// rotate too, so every grant response is persisted via the watch channel.

use std::sync::RwLock;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::weather::DEFAULT_API_BASE;

/// Leeway subtracted from the expiry when judging token validity, so a
/// token is refreshed slightly before the upstream would reject it.
const EXPIRY_LEEWAY_SECS: i64 = 10;

// ── Scopes ──────────────────────────────────────────────────────────

/// OAuth scopes requested from Netatmo, one per data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Weather station data (`getstationsdata`).
    ReadStation,
    /// Home Coach data (`gethomecoachsdata`).
    ReadHomecoach,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadStation => "read_station",
            Self::ReadHomecoach => "read_homecoach",
        }
    }
}

// ── Token ───────────────────────────────────────────────────────────

/// An OAuth token as held in memory.
///
/// `access_token` may be absent when the exporter was bootstrapped from a
/// bare refresh token -- the first [`OAuthClient::current_token`] call
/// turns that into a full token via the refresh grant.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// A token is valid when it carries an access token that has not
    /// passed its expiry (minus a small leeway).
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_some()
            && self
                .expires_at
                .is_none_or(|e| e - ChronoDuration::seconds(EXPIRY_LEEWAY_SECS) > now)
    }
}

/// On-disk token shape, compatible with the token files written by the
/// original Go exporter (`oauth2.Token` JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedToken {
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl From<&Token> for PersistedToken {
    fn from(token: &Token) -> Self {
        Self {
            access_token: token
                .access_token
                .as_ref()
                .map(|s| s.expose_secret().to_owned())
                .unwrap_or_default(),
            token_type: default_token_type(),
            refresh_token: token
                .refresh_token
                .as_ref()
                .map(|s| s.expose_secret().to_owned()),
            expiry: token.expires_at,
        }
    }
}

impl From<PersistedToken> for Token {
    fn from(persisted: PersistedToken) -> Self {
        Self {
            access_token: (!persisted.access_token.is_empty())
                .then(|| SecretString::from(persisted.access_token)),
            refresh_token: persisted.refresh_token.map(SecretString::from),
            expires_at: persisted.expiry,
        }
    }
}

// ── Grant response wire shape ───────────────────────────────────────

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

// ── OAuthClient ─────────────────────────────────────────────────────

/// OAuth2 client holding the current token for the exporter process.
///
/// `current_token()` is the "current credential" capability consumed by the
/// data source readers: it hands out a valid token, transparently running
/// the refresh grant when the held token has expired. Refreshes are
/// single-flight -- concurrent callers wait on one grant instead of racing
/// the token endpoint (which may rotate the refresh token on every use).
pub struct OAuthClient {
    http: reqwest::Client,
    base_url: Url,
    client_id: String,
    client_secret: SecretString,
    scopes: Vec<Scope>,
    /// Never held across an await; reads copy the token out.
    token: RwLock<Option<Token>>,
    refresh_gate: Mutex<()>,
    update_tx: watch::Sender<Option<Token>>,
}

impl OAuthClient {
    /// Build a client against the production Netatmo API.
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        scopes: Vec<Scope>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_API_BASE, client_id, client_secret, scopes, transport)
    }

    /// Build a client against an alternate base URL (used by tests).
    pub fn with_base_url(
        base_url: &str,
        client_id: String,
        client_secret: SecretString,
        scopes: Vec<Scope>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let (update_tx, _) = watch::channel(None);
        Ok(Self {
            http: transport.build_client()?,
            base_url: Url::parse(base_url)?,
            client_id,
            client_secret,
            scopes,
            token: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            update_tx,
        })
    }

    /// Subscribe to token updates (grant results, manual set, clear).
    ///
    /// Restored tokens installed via [`install_token`](Self::install_token)
    /// are NOT published -- they came from persistence in the first place.
    pub fn subscribe(&self) -> watch::Receiver<Option<Token>> {
        self.update_tx.subscribe()
    }

    /// Install a token restored from persistence, without publishing an
    /// update.
    pub fn install_token(&self, token: Token) {
        *self.token.write().expect("token lock poisoned") = Some(token);
    }

    /// Peek at the currently held token without validity checks or
    /// refresh. Used by the status and debug views.
    pub fn current(&self) -> Option<Token> {
        self.token.read().expect("token lock poisoned").clone()
    }

    /// The "current credential" capability: returns a valid token,
    /// refreshing it first if needed.
    ///
    /// Fails with [`Error::NotAuthenticated`] when no token material is
    /// held at all, or with the grant error when the refresh is rejected.
    pub async fn current_token(&self) -> Result<Token, Error> {
        let now = Utc::now();
        if let Some(token) = self.valid_token(now) {
            return Ok(token);
        }

        // Single-flight: the first caller runs the grant, the rest wait
        // here and pick up the stored result in the double-check.
        let _gate = self.refresh_gate.lock().await;

        let now = Utc::now();
        if let Some(token) = self.valid_token(now) {
            return Ok(token);
        }

        let refresh_token = self
            .current()
            .and_then(|t| t.refresh_token)
            .ok_or(Error::NotAuthenticated)?;

        debug!("access token expired, running refresh grant");
        let token = self.refresh_grant(&refresh_token).await?;
        self.store(token.clone());
        Ok(token)
    }

    fn valid_token(&self, now: DateTime<Utc>) -> Option<Token> {
        let guard = self.token.read().expect("token lock poisoned");
        guard.as_ref().filter(|t| t.is_valid(now)).cloned()
    }

    // ── Web flow ────────────────────────────────────────────────────

    /// Build the Netatmo consent URL for the authorization-code flow.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, Error> {
        let mut url = self.base_url.join("oauth2/authorize")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scope_param())
            .append_pair("state", state);
        Ok(url)
    }

    /// Exchange an authorization code for a token and store it.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<(), Error> {
        let scope = self.scope_param();
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
        ];

        let token = self.token_grant(&params).await?;
        self.store(token);
        Ok(())
    }

    /// Bootstrap from a bare refresh token (manual entry). The next
    /// `current_token()` call turns it into a full token.
    pub fn set_refresh_token(&self, refresh_token: SecretString) {
        self.store(Token {
            access_token: None,
            refresh_token: Some(refresh_token),
            expires_at: None,
        });
    }

    /// Drop the held token entirely.
    pub fn clear(&self) {
        *self.token.write().expect("token lock poisoned") = None;
        let _ = self.update_tx.send(None);
    }

    // ── Grants ──────────────────────────────────────────────────────

    async fn refresh_grant(&self, refresh_token: &SecretString) -> Result<Token, Error> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];

        let mut token = self.token_grant(&params).await?;
        // Netatmo may omit the refresh token from the grant response;
        // keep using the one we have in that case.
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.clone());
        }
        Ok(token)
    }

    async fn token_grant(&self, params: &[(&str, &str)]) -> Result<Token, Error> {
        let url = self.base_url.join("oauth2/token")?;
        let resp = self.http.post(url).form(params).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("token endpoint returned HTTP {status}: {}", body.trim()),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;

        Ok(Token {
            access_token: Some(SecretString::from(parsed.access_token)),
            refresh_token: parsed.refresh_token.map(SecretString::from),
            expires_at: parsed
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        })
    }

    fn store(&self, token: Token) {
        *self.token.write().expect("token lock poisoned") = Some(token.clone());
        let _ = self.update_tx.send(Some(token));
    }

    fn scope_param(&self) -> String {
        self.scopes
            .iter()
            .map(Scope::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_without_access_token_is_invalid() {
        let token = Token {
            access_token: None,
            refresh_token: Some(SecretString::from("refresh")),
            expires_at: None,
        };
        assert!(!token.is_valid(Utc::now()));
    }

    #[test]
    fn token_past_expiry_is_invalid() {
        let now = Utc::now();
        let token = Token {
            access_token: Some(SecretString::from("access")),
            refresh_token: None,
            expires_at: Some(now - ChronoDuration::seconds(1)),
        };
        assert!(!token.is_valid(now));
    }

    #[test]
    fn token_inside_leeway_window_is_invalid() {
        let now = Utc::now();
        let token = Token {
            access_token: Some(SecretString::from("access")),
            refresh_token: None,
            expires_at: Some(now + ChronoDuration::seconds(EXPIRY_LEEWAY_SECS - 1)),
        };
        assert!(!token.is_valid(now));
    }

    #[test]
    fn token_without_expiry_is_valid() {
        let token = Token {
            access_token: Some(SecretString::from("access")),
            refresh_token: None,
            expires_at: None,
        };
        assert!(token.is_valid(Utc::now()));
    }

    #[test]
    fn persisted_token_round_trip() {
        let token = Token {
            access_token: Some(SecretString::from("access")),
            refresh_token: Some(SecretString::from("refresh")),
            expires_at: Some(Utc::now()),
        };

        let persisted = PersistedToken::from(&token);
        let restored = Token::from(persisted);

        assert_eq!(
            restored.access_token.as_ref().map(|s| s.expose_secret()),
            Some("access")
        );
        assert_eq!(
            restored.refresh_token.as_ref().map(|s| s.expose_secret()),
            Some("refresh")
        );
        assert_eq!(restored.expires_at, token.expires_at);
    }

    #[test]
    fn empty_access_token_deserializes_to_none() {
        let persisted: PersistedToken =
            serde_json::from_str(r#"{"refresh_token": "refresh"}"#).expect("valid json");
        let token = Token::from(persisted);
        assert!(token.access_token.is_none());
        assert!(token.refresh_token.is_some());
    }
}
