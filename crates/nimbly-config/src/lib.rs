//! Configuration for the nimbly exporter.
//!
//! Settings merge from three layers: built-in defaults, an optional TOML
//! file, and `NIMBLY_*` environment variables. The binary applies CLI flag
//! overrides on top. Validation happens once at startup and is the only
//! fatal error class in the process -- everything after that degrades
//! gracefully.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use nimbly_core::CollectorConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Full exporter configuration after merging all layers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Externally reachable base URL of the exporter, used to build the
    /// OAuth redirect URI (e.g. "http://raspberrypi:9210").
    #[serde(default)]
    pub external_url: String,

    /// Netatmo application client id.
    #[serde(default)]
    pub client_id: String,

    /// Netatmo application client secret.
    #[serde(default)]
    pub client_secret: String,

    /// Path of the token file. When unset, authentication is lost on
    /// restart.
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// Minimum spacing between upstream fetch attempts, in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Maximum age of an individual measurement before it is excluded
    /// from output, in seconds.
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_secs: u64,

    #[serde(default = "default_true")]
    pub enable_weather: bool,

    #[serde(default = "default_true")]
    pub enable_homecoach: bool,

    /// Mount the /debug handlers.
    #[serde(default)]
    pub debug_handlers: bool,

    /// Log filter directive (e.g. "info", "nimbly=debug").
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            external_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            token_file: None,
            refresh_interval_secs: default_refresh_interval(),
            stale_threshold_secs: default_stale_threshold(),
            enable_weather: true,
            enable_homecoach: true,
            debug_handlers: false,
            log_level: default_log_level(),
        }
    }
}

fn default_listen_address() -> String {
    "0.0.0.0:9210".into()
}
fn default_refresh_interval() -> u64 {
    480
}
fn default_stale_threshold() -> u64 {
    1800
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}

impl Settings {
    /// Collector timing and source selection in the shape the core
    /// consumes.
    pub fn collector(&self) -> CollectorConfig {
        CollectorConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            stale_threshold: Duration::from_secs(self.stale_threshold_secs),
            enable_weather: self.enable_weather,
            enable_homecoach: self.enable_homecoach,
        }
    }

    /// Validate the merged settings. Called once at startup; failures
    /// here are fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::Validation {
                field: "client_id".into(),
                reason: "a Netatmo application client id is required".into(),
            });
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::Validation {
                field: "client_secret".into(),
                reason: "a Netatmo application client secret is required".into(),
            });
        }
        if !self.enable_weather && !self.enable_homecoach {
            return Err(ConfigError::Validation {
                field: "enable_weather / enable_homecoach".into(),
                reason: "at least one data source must be enabled".into(),
            });
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Validation {
                field: "refresh_interval_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.stale_threshold_secs == 0 {
            return Err(ConfigError::Validation {
                field: "stale_threshold_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if !self.external_url.is_empty()
            && !(self.external_url.starts_with("http://")
                || self.external_url.starts_with("https://"))
        {
            return Err(ConfigError::Validation {
                field: "external_url".into(),
                reason: format!("expected an http(s) URL, got '{}'", self.external_url),
            });
        }
        Ok(())
    }

    /// The redirect URI handed to the OAuth flow, derived from the
    /// external URL (falling back to the listen address for local use).
    pub fn redirect_uri(&self) -> String {
        let base = if self.external_url.is_empty() {
            format!("http://{}", self.listen_address)
        } else {
            self.external_url.trim_end_matches('/').to_owned()
        };
        format!("{base}/auth/callback")
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Merge defaults, the given TOML file (when present), and `NIMBLY_*`
/// environment variables into one [`Settings`]. Does NOT validate --
/// callers apply their own overrides first, then call
/// [`Settings::validate`].
pub fn load_settings(config_file: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    let settings: Settings = figment.merge(Env::prefixed("NIMBLY_")).extract()?;
    Ok(settings)
}
