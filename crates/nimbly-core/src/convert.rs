// ── Wire-to-domain conversion ──
//
// Builds canonical snapshots from the raw Netatmo payloads. A base
// station and each of its linked modules become independent readings
// that share the station and home names; Home Coach devices are flat.

use chrono::{DateTime, Utc};

use nimbly_api::types::{DashboardData, HomeCoachData, StationsData};

use crate::model::{SensorReading, SensorValues, Snapshot};

fn measurement_time(dashboard: Option<&DashboardData>) -> Option<DateTime<Utc>> {
    dashboard
        .and_then(|d| d.time_utc)
        .and_then(|t| DateTime::from_timestamp(t, 0))
}

fn dashboard_values(dashboard: Option<&DashboardData>) -> SensorValues {
    dashboard.map_or_else(SensorValues::default, |d| SensorValues {
        temperature: d.temperature,
        humidity: d.humidity,
        co2: d.co2,
        noise: d.noise,
        pressure: d.pressure,
        rain: d.rain,
        wind_strength: d.wind_strength,
        wind_direction: d.wind_angle,
        health_index: d.health_index,
        ..SensorValues::default()
    })
}

impl From<StationsData> for Snapshot {
    fn from(data: StationsData) -> Self {
        let mut readings = Vec::new();

        for station in data.devices {
            let mut values = dashboard_values(station.dashboard_data.as_ref());
            values.wifi_signal = station.wifi_status;

            readings.push(SensorReading {
                id: station.id,
                module_name: station.module_name,
                station_name: station.station_name.clone(),
                home_name: station.home_name.clone(),
                measured_at: measurement_time(station.dashboard_data.as_ref()),
                values,
            });

            for module in station.modules {
                let mut values = dashboard_values(module.dashboard_data.as_ref());
                values.battery_percent = module.battery_percent;
                values.rf_signal = module.rf_status;

                readings.push(SensorReading {
                    id: module.id,
                    module_name: module.module_name,
                    station_name: station.station_name.clone(),
                    home_name: station.home_name.clone(),
                    measured_at: measurement_time(module.dashboard_data.as_ref()),
                    values,
                });
            }
        }

        Self { readings }
    }
}

impl From<HomeCoachData> for Snapshot {
    fn from(data: HomeCoachData) -> Self {
        let readings = data
            .devices
            .into_iter()
            .map(|device| {
                let mut values = dashboard_values(device.dashboard_data.as_ref());
                values.wifi_signal = device.wifi_status;

                SensorReading {
                    id: device.id,
                    module_name: device.module_name,
                    station_name: device.station_name,
                    home_name: String::new(),
                    measured_at: measurement_time(device.dashboard_data.as_ref()),
                    values,
                }
            })
            .collect();

        Self { readings }
    }
}

#[cfg(test)]
mod tests {
    use nimbly_api::types::{HomeCoachDevice, Station, StationModule};

    use super::*;

    #[test]
    fn station_and_modules_become_independent_readings() {
        let data = StationsData {
            devices: vec![Station {
                id: "base".into(),
                station_name: "Roof".into(),
                home_name: "Home".into(),
                module_name: "Indoor".into(),
                wifi_status: Some(56.0),
                reachable: Some(true),
                dashboard_data: Some(DashboardData {
                    time_utc: Some(1000),
                    temperature: Some(21.0),
                    ..DashboardData::default()
                }),
                modules: vec![StationModule {
                    id: "mod1".into(),
                    module_name: "Outdoor".into(),
                    battery_percent: Some(70.0),
                    rf_status: Some(65.0),
                    reachable: Some(true),
                    dashboard_data: Some(DashboardData {
                        time_utc: Some(990),
                        temperature: Some(8.0),
                        ..DashboardData::default()
                    }),
                }],
            }],
        };

        let snapshot = Snapshot::from(data);
        assert_eq!(snapshot.readings.len(), 2);

        let base = &snapshot.readings[0];
        assert_eq!(base.id, "base");
        assert_eq!(base.values.wifi_signal, Some(56.0));
        assert_eq!(base.values.battery_percent, None);

        let module = &snapshot.readings[1];
        assert_eq!(module.station_name, "Roof");
        assert_eq!(module.home_name, "Home");
        assert_eq!(module.values.battery_percent, Some(70.0));
        assert_eq!(module.values.rf_signal, Some(65.0));
        assert_eq!(module.values.wifi_signal, None);
    }

    #[test]
    fn station_without_dashboard_has_no_measurement() {
        let data = StationsData {
            devices: vec![Station {
                id: "base".into(),
                station_name: String::new(),
                home_name: String::new(),
                module_name: String::new(),
                wifi_status: None,
                reachable: Some(false),
                dashboard_data: None,
                modules: Vec::new(),
            }],
        };

        let snapshot = Snapshot::from(data);
        assert_eq!(snapshot.readings[0].measured_at, None);
        assert_eq!(snapshot.readings[0].values, SensorValues::default());
    }

    #[test]
    fn homecoach_devices_have_empty_home() {
        let data = HomeCoachData {
            devices: vec![HomeCoachDevice {
                id: "hc1".into(),
                station_name: "Bedroom".into(),
                module_name: String::new(),
                wifi_status: Some(60.0),
                reachable: Some(true),
                dashboard_data: Some(DashboardData {
                    time_utc: Some(2000),
                    co2: Some(800.0),
                    health_index: Some(1.0),
                    ..DashboardData::default()
                }),
            }],
        };

        let snapshot = Snapshot::from(data);
        let reading = &snapshot.readings[0];
        assert!(reading.home_name.is_empty());
        assert_eq!(reading.station_name, "Bedroom");
        assert_eq!(reading.values.health_index, Some(1.0));
        assert_eq!(reading.values.wifi_signal, Some(60.0));
    }
}
