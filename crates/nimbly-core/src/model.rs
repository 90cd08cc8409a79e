// ── Domain model ──
//
// Canonical types shared by the cache, projector, and aggregator.
// A Snapshot is immutable once built: a successful refresh replaces the
// previous Arc wholesale, never merges into it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumIter};

/// One category of upstream sensor data, each with its own fetch
/// capability and cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Weather station class (`getstationsdata`).
    #[strum(serialize = "weather")]
    Weather,
    /// Indoor air quality class (`gethomecoachsdata`).
    #[strum(serialize = "homecoach")]
    HomeCoach,
}

impl SourceKind {
    /// Label value used for the `device_class` label in the unified
    /// schema and as the source identifier in logs and debug output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::HomeCoach => "homecoach",
        }
    }
}

/// The sensor metrics a reading can carry. Which ones are actually
/// present varies per device type -- see [`SensorValues`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum SensorMetric {
    /// Measurement timestamp of the reading, as a metric of its own.
    Updated,
    Temperature,
    Humidity,
    Co2,
    Noise,
    Pressure,
    Rain,
    WindStrength,
    WindDirection,
    Battery,
    WifiSignal,
    RfSignal,
    HealthIndex,
}

/// Metric values reported by one device or module. `None` means the
/// upstream did not report that metric -- distinct from zero, and never
/// emitted as an observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorValues {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub co2: Option<f64>,
    pub noise: Option<f64>,
    pub pressure: Option<f64>,
    pub rain: Option<f64>,
    pub wind_strength: Option<f64>,
    pub wind_direction: Option<f64>,
    pub battery_percent: Option<f64>,
    pub wifi_signal: Option<f64>,
    pub rf_signal: Option<f64>,
    pub health_index: Option<f64>,
}

impl SensorValues {
    /// Iterate over the metrics that are actually present, in a fixed
    /// order.
    pub fn present(&self) -> impl Iterator<Item = (SensorMetric, f64)> + '_ {
        [
            (SensorMetric::Temperature, self.temperature),
            (SensorMetric::Humidity, self.humidity),
            (SensorMetric::Co2, self.co2),
            (SensorMetric::Noise, self.noise),
            (SensorMetric::Pressure, self.pressure),
            (SensorMetric::Rain, self.rain),
            (SensorMetric::WindStrength, self.wind_strength),
            (SensorMetric::WindDirection, self.wind_direction),
            (SensorMetric::Battery, self.battery_percent),
            (SensorMetric::WifiSignal, self.wifi_signal),
            (SensorMetric::RfSignal, self.rf_signal),
            (SensorMetric::HealthIndex, self.health_index),
        ]
        .into_iter()
        .filter_map(|(metric, value)| value.map(|v| (metric, v)))
    }
}

/// One device or module reading inside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorReading {
    /// Stable upstream identifier (MAC-style).
    pub id: String,
    /// Human-readable module name; may be empty, in which case
    /// [`display_name`](Self::display_name) derives a fallback.
    pub module_name: String,
    /// Name of the owning station.
    pub station_name: String,
    /// Name of the home the station belongs to; empty for sources that
    /// do not report one.
    pub home_name: String,
    /// When the sensor itself took the measurement. `None` when the
    /// upstream reported no data for this item.
    pub measured_at: Option<DateTime<Utc>>,
    pub values: SensorValues,
}

impl SensorReading {
    /// Display name for labels: the module name, or a deterministic
    /// fallback derived from the stable id when the name is empty.
    pub fn display_name(&self) -> String {
        if self.module_name.is_empty() {
            format!("id-{}", self.id)
        } else {
            self.module_name.clone()
        }
    }
}

/// The full device list from one successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub readings: Vec<SensorReading>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_id() {
        let reading = SensorReading {
            id: "dev1".into(),
            ..SensorReading::default()
        };
        assert_eq!(reading.display_name(), "id-dev1");
    }

    #[test]
    fn display_name_prefers_module_name() {
        let reading = SensorReading {
            id: "dev1".into(),
            module_name: "Outdoor".into(),
            ..SensorReading::default()
        };
        assert_eq!(reading.display_name(), "Outdoor");
    }

    #[test]
    fn present_skips_absent_values() {
        let values = SensorValues {
            temperature: Some(21.0),
            co2: Some(600.0),
            ..SensorValues::default()
        };
        let present: Vec<_> = values.present().collect();
        assert_eq!(
            present,
            vec![
                (SensorMetric::Temperature, 21.0),
                (SensorMetric::Co2, 600.0)
            ]
        );
    }
}
