// Hand-crafted async HTTP client for the Netatmo weather station API.
//
// Endpoint: GET /api/getstationsdata
// Auth: bearer token per request (tokens rotate, so no default header)

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::{TransportConfig, handle_json_response};
use crate::types::{StationsData, StationsResponse};

pub(crate) const DEFAULT_API_BASE: &str = "https://api.netatmo.com";

/// Async client for the weather station data endpoint.
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: Url,
}

impl WeatherClient {
    /// Build a client against the production Netatmo API.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_API_BASE, transport)
    }

    /// Build a client against an alternate base URL (used by tests).
    pub fn with_base_url(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url: Url::parse(base_url)?,
        })
    }

    /// Fetch the full station list for the authenticated account.
    ///
    /// One attempt, no retries -- callers own the retry/refresh policy.
    pub async fn get_stations_data(&self, access_token: &SecretString) -> Result<StationsData, Error> {
        let url = self.base_url.join("api/getstationsdata")?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;

        let parsed: StationsResponse = handle_json_response(resp).await?;
        Ok(parsed.body)
    }
}
