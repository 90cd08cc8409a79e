// Hand-crafted async HTTP client for the Netatmo Home Coach API.
//
// Endpoint: GET /api/gethomecoachsdata
// Auth: bearer token per request

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::{TransportConfig, handle_json_response};
use crate::types::{HomeCoachData, HomeCoachResponse};
use crate::weather::DEFAULT_API_BASE;

/// Async client for the Home Coach indoor air quality endpoint.
pub struct HomeCoachClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HomeCoachClient {
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

    /// Fetch all Home Coach devices for the authenticated account.
    pub async fn get_homecoach_data(
        &self,
        access_token: &SecretString,
    ) -> Result<HomeCoachData, Error> {
        let url = self.base_url.join("api/gethomecoachsdata")?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;

        let parsed: HomeCoachResponse = handle_json_response(resp).await?;
        Ok(parsed.body)
    }
}
