// Wire types for the Netatmo data endpoints.
//
// Field names mirror the JSON the API actually returns -- capitalized
// measurement keys inside `dashboard_data`, `_id` for device identifiers.
// Every measurement is optional: a missing key means the station did not
// report that metric, which is distinct from zero.

use serde::{Deserialize, Serialize};

/// The `dashboard_data` block carried by stations, linked modules, and
/// Home Coach devices. `time_utc` is the measurement timestamp of the
/// values in this block, as reported by the sensor itself.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DashboardData {
    pub time_utc: Option<i64>,

    #[serde(rename = "Temperature")]
    pub temperature: Option<f64>,
    #[serde(rename = "Humidity")]
    pub humidity: Option<f64>,
    #[serde(rename = "CO2")]
    pub co2: Option<f64>,
    #[serde(rename = "Noise")]
    pub noise: Option<f64>,
    #[serde(rename = "Pressure")]
    pub pressure: Option<f64>,
    #[serde(rename = "Rain")]
    pub rain: Option<f64>,
    #[serde(rename = "WindStrength")]
    pub wind_strength: Option<f64>,
    #[serde(rename = "WindAngle")]
    pub wind_angle: Option<f64>,
    #[serde(rename = "health_idx")]
    pub health_index: Option<f64>,
}

// ── Weather station (`/api/getstationsdata`) ────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StationsResponse {
    pub body: StationsData,
}

/// Payload of a successful `getstationsdata` call.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StationsData {
    #[serde(default)]
    pub devices: Vec<Station>,
}

/// A base station, with its own sensors plus any linked outdoor/extra
/// modules.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Station {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub station_name: String,
    #[serde(default)]
    pub home_name: String,
    #[serde(default)]
    pub module_name: String,
    pub wifi_status: Option<f64>,
    pub reachable: Option<bool>,
    pub dashboard_data: Option<DashboardData>,
    #[serde(default)]
    pub modules: Vec<StationModule>,
}

/// A battery-powered module linked to a base station (outdoor, wind,
/// rain, or additional indoor module).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StationModule {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub module_name: String,
    pub battery_percent: Option<f64>,
    pub rf_status: Option<f64>,
    pub reachable: Option<bool>,
    pub dashboard_data: Option<DashboardData>,
}

// ── Home Coach (`/api/gethomecoachsdata`) ───────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HomeCoachResponse {
    pub body: HomeCoachData,
}

/// Payload of a successful `gethomecoachsdata` call.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HomeCoachData {
    #[serde(default)]
    pub devices: Vec<HomeCoachDevice>,
}

/// One Home Coach indoor air quality device.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HomeCoachDevice {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub station_name: String,
    #[serde(default)]
    pub module_name: String,
    pub wifi_status: Option<f64>,
    pub reachable: Option<bool>,
    pub dashboard_data: Option<DashboardData>,
}
