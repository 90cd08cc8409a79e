//! Async client for the Netatmo cloud API.
//!
//! This crate owns everything that talks to Netatmo over the wire:
//!
//! - **[`OAuthClient`]** — OAuth2 token lifecycle: authorization-code
//!   exchange, refresh-token grant (single-flight), and a `watch` channel
//!   that publishes token updates for persistence.
//! - **[`WeatherClient`]** / **[`HomeCoachClient`]** — one fetch per call
//!   against `/api/getstationsdata` and `/api/gethomecoachsdata`, returning
//!   the raw wire types from [`types`].
//! - **[`Error`]** — unified failure taxonomy (auth, transport, API status,
//!   decoding). Consumers treat all of these uniformly as a failed fetch.

pub mod auth;
pub mod error;
pub mod homecoach;
pub mod transport;
pub mod types;
pub mod weather;

pub use auth::{OAuthClient, PersistedToken, Scope, Token};
pub use error::Error;
pub use homecoach::HomeCoachClient;
pub use transport::TransportConfig;
pub use weather::WeatherClient;
