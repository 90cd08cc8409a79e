//! Prometheus publisher for the aggregator's observations.
//!
//! Gauge families are registered once at startup (one registry per label
//! schema) and refilled from the current collection on every scrape:
//! reset, set from observations, encode. The refill is serialized by an
//! async mutex so concurrent scrapes cannot interleave their writes; the
//! underlying cache reads stay lock-free for other scrapes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use strum::IntoEnumIterator;
use tokio::sync::Mutex;
use tracing::debug;

use nimbly_api::Token;
use nimbly_core::{Collection, LabelSchema, SensorMetric, SourceKind};

const UNIFIED_LABELS: &[&str] = &["device_class", "device_id", "home", "module", "station"];
const WEATHER_LABELS: &[&str] = &["module", "station", "home"];
const HOMECOACH_LABELS: &[&str] = &["device_id", "device_name"];

/// Family name suffix and help text, shared by the unified schema and the
/// legacy weather schema (both use the `netatmo_sensor_` prefix).
fn sensor_family(metric: SensorMetric) -> (&'static str, &'static str) {
    match metric {
        SensorMetric::Updated => ("updated", "Timestamp of last update"),
        SensorMetric::Temperature => {
            ("temperature_celsius", "Temperature measurement in celsius")
        }
        SensorMetric::Humidity => (
            "humidity_percent",
            "Relative humidity measurement in percent",
        ),
        SensorMetric::Co2 => ("co2_ppm", "Carbondioxide measurement in parts per million"),
        SensorMetric::Noise => ("noise_db", "Noise measurement in decibels"),
        SensorMetric::Pressure => (
            "pressure_mb",
            "Atmospheric pressure measurement in millibar",
        ),
        SensorMetric::Rain => ("rain_amount_mm", "Rain amount in millimeters"),
        SensorMetric::WindStrength => {
            ("wind_strength_kph", "Wind strength in kilometers per hour")
        }
        SensorMetric::WindDirection => ("wind_direction_degrees", "Wind direction in degrees"),
        SensorMetric::Battery => ("battery_percent", "Battery remaining life (10: low)"),
        SensorMetric::WifiSignal => (
            "wifi_signal_strength",
            "Wifi signal strength (86: bad, 71: avg, 56: good)",
        ),
        SensorMetric::RfSignal => (
            "rf_signal_strength",
            "RF signal strength (90: lowest, 60: highest)",
        ),
        SensorMetric::HealthIndex => (
            "health_index",
            "Air quality health index (0: Healthy, 1: Fine, 2: Fair, 3: Poor, 4: Unhealthy)",
        ),
    }
}

/// Legacy Home Coach families (`netatmo_homecoach_` prefix). `None` for
/// metrics a Home Coach never reports.
fn homecoach_family(metric: SensorMetric) -> Option<(&'static str, &'static str)> {
    match metric {
        SensorMetric::Updated => Some(("updated", "Timestamp of last update")),
        SensorMetric::Temperature => Some((
            "temperature",
            "Netatmo Home Coach measured temperature in degrees Celsius.",
        )),
        SensorMetric::Humidity => Some((
            "humidity",
            "Netatmo Home Coach measured humidity in percent.",
        )),
        SensorMetric::Co2 => Some(("co2", "Netatmo Home Coach measured CO2 level in ppm.")),
        SensorMetric::Noise => Some(("noise", "Netatmo Home Coach measured noise level in dB.")),
        SensorMetric::Pressure => {
            Some(("pressure", "Netatmo Home Coach measured pressure in mb."))
        }
        SensorMetric::HealthIndex => Some((
            "health_index",
            "Netatmo Home Coach health index (0: Healthy, 1: Fine, 2: Fair, 3: Poor, 4: Unhealthy).",
        )),
        SensorMetric::WifiSignal => Some((
            "wifi_signal_strength",
            "Wifi signal strength (86: bad, 71: avg, 56: good).",
        )),
        _ => None,
    }
}

struct HealthGauges {
    up: Gauge,
    refresh_interval: Gauge,
    last_refresh_time: Gauge,
    last_refresh_duration: Gauge,
    cache_updated: Gauge,
}

impl HealthGauges {
    fn register(registry: &Registry, prefix: &str) -> Result<Self, prometheus::Error> {
        let up = Gauge::new(
            format!("{prefix}up"),
            "Zero if there was an error during the last refresh try.",
        )?;
        let refresh_interval = Gauge::new(
            format!("{prefix}refresh_interval_seconds"),
            "Contains the configured refresh interval in seconds. This is provided as a convenience for calculations with the cache update time.",
        )?;
        let last_refresh_time = Gauge::new(
            format!("{prefix}last_refresh_time"),
            "Contains the time of the last refresh try, successful or not.",
        )?;
        let last_refresh_duration = Gauge::new(
            format!("{prefix}last_refresh_duration_seconds"),
            "Contains the time it took for the last refresh to complete, even if it was unsuccessful.",
        )?;
        let cache_updated = Gauge::new(
            format!("{prefix}cache_updated_time"),
            "Contains the time of the cached data.",
        )?;

        for gauge in [
            &up,
            &refresh_interval,
            &last_refresh_time,
            &last_refresh_duration,
            &cache_updated,
        ] {
            registry.register(Box::new(gauge.clone()))?;
        }

        Ok(Self {
            up,
            refresh_interval,
            last_refresh_time,
            last_refresh_duration,
            cache_updated,
        })
    }
}

/// One schema's registry plus the gauge families observations land in.
pub struct MetricsView {
    registry: Registry,
    sensor: HashMap<(SourceKind, SensorMetric), GaugeVec>,
    health: HashMap<SourceKind, HealthGauges>,
    token_valid: Gauge,
    token_expiry: Gauge,
    render_gate: Mutex<()>,
}

impl MetricsView {
    /// Register all gauge families for the given schema and enabled
    /// sources. Descriptors are created exactly once, here.
    pub fn new(schema: LabelSchema, sources: &[SourceKind]) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let mut sensor = HashMap::new();

        match schema {
            LabelSchema::Unified => {
                for metric in SensorMetric::iter() {
                    let (suffix, help) = sensor_family(metric);
                    let vec = GaugeVec::new(
                        Opts::new(format!("netatmo_sensor_{suffix}"), help),
                        UNIFIED_LABELS,
                    )?;
                    registry.register(Box::new(vec.clone()))?;
                    for source in sources {
                        sensor.insert((*source, metric), vec.clone());
                    }
                }
            }
            LabelSchema::PerSource => {
                for source in sources {
                    match source {
                        SourceKind::Weather => {
                            for metric in SensorMetric::iter() {
                                // Health index is a Home Coach metric; the
                                // legacy weather schema never declared it.
                                if metric == SensorMetric::HealthIndex {
                                    continue;
                                }
                                let (suffix, help) = sensor_family(metric);
                                let vec = GaugeVec::new(
                                    Opts::new(format!("netatmo_sensor_{suffix}"), help),
                                    WEATHER_LABELS,
                                )?;
                                registry.register(Box::new(vec.clone()))?;
                                sensor.insert((*source, metric), vec);
                            }
                        }
                        SourceKind::HomeCoach => {
                            for metric in SensorMetric::iter() {
                                let Some((suffix, help)) = homecoach_family(metric) else {
                                    continue;
                                };
                                let vec = GaugeVec::new(
                                    Opts::new(format!("netatmo_homecoach_{suffix}"), help),
                                    HOMECOACH_LABELS,
                                )?;
                                registry.register(Box::new(vec.clone()))?;
                                sensor.insert((*source, metric), vec);
                            }
                        }
                    }
                }
            }
        }

        let mut health = HashMap::new();
        for source in sources {
            let prefix = match source {
                SourceKind::Weather => "netatmo_",
                SourceKind::HomeCoach => "netatmo_homecoach_",
            };
            health.insert(*source, HealthGauges::register(&registry, prefix)?);
        }

        let token_valid = Gauge::new(
            "netatmo_token_valid",
            "One if the OAuth token is currently valid.",
        )?;
        let token_expiry = Gauge::new(
            "netatmo_token_expiry_time",
            "Contains the time when the OAuth token expires.",
        )?;
        registry.register(Box::new(token_valid.clone()))?;
        registry.register(Box::new(token_expiry.clone()))?;

        Ok(Self {
            registry,
            sensor,
            health,
            token_valid,
            token_expiry,
            render_gate: Mutex::new(()),
        })
    }

    /// Fill the gauge families from the collection and encode the
    /// registry into the Prometheus text format.
    pub async fn render(
        &self,
        collection: &Collection,
        token: Option<&Token>,
    ) -> Result<String, prometheus::Error> {
        let _gate = self.render_gate.lock().await;

        for vec in self.sensor.values() {
            vec.reset();
        }

        for obs in &collection.observations {
            let Some(vec) = self.sensor.get(&(obs.source, obs.metric)) else {
                // Family not declared in this view (e.g. wind metrics on
                // the legacy Home Coach schema).
                debug!(source = %obs.source, metric = ?obs.metric, "no family for observation");
                continue;
            };
            let labels: Vec<&str> = obs.labels.iter().map(String::as_str).collect();
            vec.with_label_values(&labels).set(obs.value);
        }

        for sample in &collection.health {
            let Some(gauges) = self.health.get(&sample.source) else {
                continue;
            };
            gauges.up.set(if sample.up { 1.0 } else { 0.0 });
            gauges
                .refresh_interval
                .set(sample.refresh_interval.as_secs_f64());
            gauges
                .last_refresh_time
                .set(timestamp_value(sample.last_attempt));
            gauges
                .last_refresh_duration
                .set(sample.last_duration.as_secs_f64());
            gauges
                .cache_updated
                .set(timestamp_value(sample.cache_updated));
        }

        let now = Utc::now();
        let valid = token.is_some_and(|t| t.is_valid(now));
        self.token_valid.set(if valid { 1.0 } else { 0.0 });
        self.token_expiry
            .set(timestamp_value(token.and_then(|t| t.expires_at)));

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|_| prometheus::Error::Msg("metrics output was not valid UTF-8".into()))
    }
}

#[allow(clippy::cast_precision_loss)]
fn timestamp_value(instant: Option<DateTime<Utc>>) -> f64 {
    instant.map_or(0.0, |t| t.timestamp() as f64)
}
