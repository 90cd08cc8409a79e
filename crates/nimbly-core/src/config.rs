// Configuration values consumed by the core. Parsing and validation live
// in `nimbly-config`; this is the already-validated shape the aggregator
// and caches are built from.

use std::time::Duration;

/// Collector timing and source selection.
#[derive(Debug, Clone, Copy)]
pub struct CollectorConfig {
    /// Minimum spacing between upstream fetch attempts per source.
    pub refresh_interval: Duration,
    /// Maximum age of an individual measurement before it is excluded
    /// from output.
    pub stale_threshold: Duration,
    pub enable_weather: bool,
    pub enable_homecoach: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(480),
            stale_threshold: Duration::from_secs(1800),
            enable_weather: true,
            enable_homecoach: true,
        }
    }
}
