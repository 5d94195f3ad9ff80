#![allow(clippy::unwrap_used, clippy::float_cmp)]
// Integration tests for `HomeWizardClient` using wiremock.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hwinstant_api::{Error, ExternalDeviceType, HomeWizardClient, ProductType, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HomeWizardClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = HomeWizardClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn device_body(api_version: &str) -> serde_json::Value {
    json!({
        "product_type": "HWE-P1",
        "product_name": "P1 meter",
        "serial": "5c2fafabcdef",
        "firmware_version": "4.19",
        "api_version": api_version,
    })
}

fn data_body() -> serde_json::Value {
    json!({
        "wifi_ssid": "My Wi-Fi",
        "wifi_strength": 100,
        "smr_version": 50,
        "meter_model": "ISKRA  2M550T-101",
        "unique_id": "00112233445566778899AABBCCDDEEFF",
        "active_tariff": 2,
        "total_power_import_kwh": 13779.338,
        "total_power_import_t1_kwh": 10830.511,
        "total_power_import_t2_kwh": 2948.827,
        "total_power_export_kwh": 0,
        "total_power_export_t1_kwh": 0,
        "total_power_export_t2_kwh": 0,
        "active_power_w": -543,
        "active_power_l1_w": -676,
        "active_power_l2_w": 133,
        "active_power_l3_w": 0,
        "active_current_l1_a": -4,
        "active_voltage_l1_v": 230.111,
        "active_frequency_hz": 50,
        "voltage_sag_l1_count": 1,
        "any_power_fail_count": 4,
        "long_power_fail_count": 5,
        "active_power_average_w": 123.0,
        "montly_power_peak_w": 1111.0,
        "montly_power_peak_timestamp": 230_101_080_010_i64,
        "total_gas_m3": 1122.333,
        "gas_timestamp": 210_314_112_233_i64,
        "gas_unique_id": "01FFEEDDCCBBAA99887766554433221100",
        "external": [
            {
                "unique_id": "G001",
                "type": "gas_meter",
                "timestamp": 230_125_220_957_i64,
                "value": 111.111,
                "unit": "m3"
            },
            {
                "unique_id": "W001",
                "type": "water_meter",
                "timestamp": 230_125_220_957_i64,
                "value": 222.222,
                "unit": "m3"
            },
            {
                "unique_id": "X001",
                "type": "mystery_meter",
                "timestamp": null,
                "value": 1.0,
                "unit": "kWh"
            }
        ]
    })
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ── Identity ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_device_identity() {
    let (server, client) = setup().await;
    mount_json(&server, "/api", device_body("v1")).await;

    let device = client.device().await.unwrap();

    assert_eq!(device.product(), Some(ProductType::P1Meter));
    assert_eq!(device.serial.as_deref(), Some("5c2fafabcdef"));
    assert_eq!(device.model_name(), "Wi-Fi P1 Meter");
}

#[tokio::test]
async fn test_device_rejects_other_api_versions() {
    let (server, client) = setup().await;
    mount_json(&server, "/api", device_body("v2")).await;

    let result = client.device().await;

    assert!(
        matches!(result, Err(Error::UnsupportedApiVersion { ref found }) if found == "v2"),
        "expected UnsupportedApiVersion, got: {result:?}"
    );
}

#[tokio::test]
async fn test_device_without_serial() {
    let (server, client) = setup().await;
    mount_json(
        &server,
        "/api",
        json!({
            "product_type": "HWE-P1",
            "product_name": "P1 meter",
            "firmware_version": "2.11",
            "api_version": "v1",
        }),
    )
    .await;

    let device = client.device().await.unwrap();
    assert!(device.serial.is_none());
}

// ── Status mapping ──────────────────────────────────────────────────

#[tokio::test]
async fn test_forbidden_maps_to_disabled() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = client.device().await;
    assert!(
        matches!(result, Err(Error::Disabled)),
        "expected Disabled, got: {result:?}"
    );
}

#[tokio::test]
async fn test_server_error_maps_to_request_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/data"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client.measurement().await.unwrap_err();
    assert!(err.is_request_error(), "expected request error, got: {err:?}");
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let result = client.device().await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body.contains("nope")),
        "expected Deserialization, got: {result:?}"
    );
}

#[tokio::test]
async fn test_slow_device_reports_subsecond_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(device_body("v1"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let transport = TransportConfig::with_timeout(Duration::from_millis(250));
    let client = HomeWizardClient::new(&server.address().to_string(), &transport).unwrap();

    let err = client.device().await.unwrap_err();
    assert!(
        matches!(err, Error::Timeout { timeout } if timeout == Duration::from_millis(250)),
        "expected Timeout, got: {err:?}"
    );
    assert!(err.is_request_error());
    assert_eq!(err.to_string(), "Request timed out after 250ms");
}

#[tokio::test]
async fn test_unreachable_device_is_request_error() {
    let client = HomeWizardClient::with_client(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:9/").unwrap(),
    );

    let err = client.device().await.unwrap_err();
    assert!(err.is_request_error(), "expected request error, got: {err:?}");
}

#[tokio::test]
async fn test_closed_client_refuses_requests() {
    let (server, client) = setup().await;
    mount_json(&server, "/api", device_body("v1")).await;

    client.close();

    let result = client.device().await;
    assert!(matches!(result, Err(Error::Closed)), "got: {result:?}");
}

// ── Measurement ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_measurement_normalizes_v1_fields() {
    let (server, client) = setup().await;
    mount_json(&server, "/api/v1/data", data_body()).await;

    let m = client.measurement().await.unwrap();

    assert_eq!(m.protocol_version, Some(50));
    assert_eq!(m.tariff, Some(2));
    assert_eq!(m.energy_import_kwh, Some(13779.338));
    assert_eq!(m.energy_export_kwh, Some(0.0));
    assert_eq!(m.power_w, Some(-543.0));
    assert_eq!(m.voltage_l1_v, Some(230.111));
    assert_eq!(m.average_power_15m_w, Some(123.0));
    assert_eq!(m.monthly_power_peak_w, Some(1111.0));
    assert_eq!(
        m.monthly_power_peak_timestamp.unwrap().to_string(),
        "2023-01-01 08:00:10"
    );
    assert_eq!(m.gas_timestamp.unwrap().to_string(), "2021-03-14 11:22:33");
    assert!(m.voltage_v.is_none());

    let external = m.external_devices.unwrap();
    assert_eq!(external.len(), 3);
    assert_eq!(
        external["G001"].device_type,
        Some(ExternalDeviceType::GasMeter)
    );
    assert_eq!(external["W001"].value, Some(222.222));
    assert_eq!(external["X001"].device_type, None);
    assert!(external["X001"].timestamp.is_none());
}

// ── Combined ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_combined_merges_system_status() {
    let (server, client) = setup().await;
    mount_json(&server, "/api", device_body("v1")).await;
    mount_json(&server, "/api/v1/data", data_body()).await;
    mount_json(&server, "/api/v1/system", json!({ "cloud_enabled": false })).await;

    let combined = client.combined().await.unwrap();

    assert_eq!(combined.device.serial.as_deref(), Some("5c2fafabcdef"));
    let system = combined.system.unwrap();
    assert_eq!(system.wifi_ssid.as_deref(), Some("My Wi-Fi"));
    assert_eq!(system.wifi_strength_pct, Some(100));
    assert_eq!(system.cloud_enabled, Some(false));
}

#[tokio::test]
async fn test_combined_tolerates_missing_system_endpoint() {
    let (server, client) = setup().await;
    mount_json(&server, "/api", device_body("v1")).await;
    mount_json(&server, "/api/v1/data", json!({ "active_power_w": 12.5 })).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/system"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let combined = client.combined().await.unwrap();

    assert_eq!(combined.measurement.power_w, Some(12.5));
    assert!(combined.system.is_none());
}

#[tokio::test]
async fn test_combined_propagates_disabled() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = client.combined().await;
    assert!(matches!(result, Err(Error::Disabled)), "got: {result:?}");
}

#[tokio::test]
async fn test_system_not_found_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/system"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client.system().await.unwrap().is_none());
}
