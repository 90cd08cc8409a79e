// Integration tests for `WeatherClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nimbly_api::{Error, TransportConfig, WeatherClient};

async fn setup() -> (MockServer, WeatherClient) {
    let server = MockServer::start().await;
    let client = WeatherClient::with_base_url(&server.uri(), &TransportConfig::default())
        .expect("client builds");
    (server, client)
}

fn token() -> SecretString {
    SecretString::from("test-access-token")
}

#[tokio::test]
async fn test_get_stations_data() {
    let (server, client) = setup().await;

    let body = json!({
        "status": "ok",
        "body": {
            "devices": [
                {
                    "_id": "70:ee:50:00:00:01",
                    "station_name": "Backyard Station",
                    "home_name": "Home",
                    "module_name": "Indoor",
                    "wifi_status": 56,
                    "reachable": true,
                    "dashboard_data": {
                        "time_utc": 1700000000,
                        "Temperature": 21.4,
                        "Humidity": 48,
                        "CO2": 620,
                        "Noise": 38,
                        "Pressure": 1013.2
                    },
                    "modules": [
                        {
                            "_id": "02:00:00:00:00:01",
                            "module_name": "Outdoor",
                            "battery_percent": 73,
                            "rf_status": 68,
                            "reachable": true,
                            "dashboard_data": {
                                "time_utc": 1700000012,
                                "Temperature": 8.1,
                                "Humidity": 91
                            }
                        }
                    ]
                }
            ]
        }
    });

    Mock::given(method("GET"))
        .and(path("/api/getstationsdata"))
        .and(header("Authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let data = client.get_stations_data(&token()).await.expect("fetch ok");

    assert_eq!(data.devices.len(), 1);
    let station = &data.devices[0];
    assert_eq!(station.id, "70:ee:50:00:00:01");
    assert_eq!(station.station_name, "Backyard Station");
    assert_eq!(station.home_name, "Home");

    let dashboard = station.dashboard_data.as_ref().expect("dashboard present");
    assert_eq!(dashboard.time_utc, Some(1_700_000_000));
    assert_eq!(dashboard.temperature, Some(21.4));
    // Rain is not reported by an indoor module -- must stay absent.
    assert_eq!(dashboard.rain, None);

    assert_eq!(station.modules.len(), 1);
    let module = &station.modules[0];
    assert_eq!(module.module_name, "Outdoor");
    assert_eq!(module.battery_percent, Some(73.0));
    assert_eq!(
        module.dashboard_data.as_ref().and_then(|d| d.temperature),
        Some(8.1)
    );
}

#[tokio::test]
async fn test_error_envelope_becomes_api_error() {
    let (server, client) = setup().await;

    let body = json!({
        "error": { "code": 2, "message": "Invalid access token" }
    });

    Mock::given(method("GET"))
        .and(path("/api/getstationsdata"))
        .respond_with(ResponseTemplate::new(403).set_body_json(&body))
        .mount(&server)
        .await;

    let err = client.get_stations_data(&token()).await.expect_err("must fail");
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 403);
            assert!(message.contains("Invalid access token"));
            assert!(message.contains("code 2"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_becomes_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/getstationsdata"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let err = client.get_stations_data(&token()).await.expect_err("must fail");
    assert!(matches!(err, Error::Deserialization { .. }));
}

#[tokio::test]
async fn test_empty_device_list() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/getstationsdata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "body": {} })))
        .mount(&server)
        .await;

    let data = client.get_stations_data(&token()).await.expect("fetch ok");
    assert!(data.devices.is_empty());
}
