//! Clap derive structure for the `nimbly` exporter daemon.
//!
//! Every flag can also be set through its `NIMBLY_*` environment variable
//! or the TOML config file; flags win over both.

use std::path::PathBuf;

use clap::Parser;

/// nimbly -- Prometheus exporter for Netatmo sensors
#[derive(Debug, Parser)]
#[command(
    name = "nimbly",
    version,
    about = "Export Netatmo weather station and Home Coach readings as Prometheus metrics",
    long_about = "A pull-based metrics bridge for the Netatmo cloud API.\n\n\
        Scrapes are served from an in-process cache; upstream polling runs\n\
        in the background at its own cadence, at most once per refresh\n\
        interval per data source."
)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "NIMBLY_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, short = 'a', env = "NIMBLY_LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    /// Externally reachable URL of this exporter (for the OAuth redirect)
    #[arg(long, env = "NIMBLY_EXTERNAL_URL")]
    pub external_url: Option<String>,

    /// Netatmo application client id
    #[arg(long, env = "NIMBLY_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Netatmo application client secret
    #[arg(long, env = "NIMBLY_CLIENT_SECRET", hide_env = true)]
    pub client_secret: Option<String>,

    /// File to persist the OAuth token across restarts
    #[arg(long, env = "NIMBLY_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Seconds between upstream fetch attempts per source
    #[arg(long, env = "NIMBLY_REFRESH_INTERVAL_SECS")]
    pub refresh_interval_secs: Option<u64>,

    /// Seconds after which an individual measurement is considered stale
    #[arg(long, env = "NIMBLY_STALE_THRESHOLD_SECS")]
    pub stale_threshold_secs: Option<u64>,

    /// Enable or disable the weather station source
    #[arg(long, env = "NIMBLY_ENABLE_WEATHER")]
    pub enable_weather: Option<bool>,

    /// Enable or disable the Home Coach source
    #[arg(long, env = "NIMBLY_ENABLE_HOMECOACH")]
    pub enable_homecoach: Option<bool>,

    /// Mount the /debug handlers
    #[arg(long, env = "NIMBLY_DEBUG_HANDLERS")]
    pub debug_handlers: bool,

    /// Log filter directive (e.g. "info", "nimbly=debug")
    #[arg(long, env = "NIMBLY_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Apply flag overrides on top of the merged file/env settings.
    pub fn apply(&self, settings: &mut nimbly_config::Settings) {
        if let Some(ref v) = self.listen_address {
            settings.listen_address.clone_from(v);
        }
        if let Some(ref v) = self.external_url {
            settings.external_url.clone_from(v);
        }
        if let Some(ref v) = self.client_id {
            settings.client_id.clone_from(v);
        }
        if let Some(ref v) = self.client_secret {
            settings.client_secret.clone_from(v);
        }
        if let Some(ref v) = self.token_file {
            settings.token_file = Some(v.clone());
        }
        if let Some(v) = self.refresh_interval_secs {
            settings.refresh_interval_secs = v;
        }
        if let Some(v) = self.stale_threshold_secs {
            settings.stale_threshold_secs = v;
        }
        if let Some(v) = self.enable_weather {
            settings.enable_weather = v;
        }
        if let Some(v) = self.enable_homecoach {
            settings.enable_homecoach = v;
        }
        if self.debug_handlers {
            settings.debug_handlers = true;
        }
        if let Some(ref v) = self.log_level {
            settings.log_level.clone_from(v);
        }
    }
}
