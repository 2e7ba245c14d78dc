#![allow(clippy::unwrap_used)]
// Integration tests for `ProxyClient` using wiremock.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sv241_api::models::{DeviceCommand, HeaterMode, HistoryQuery, ProxyConfig};
use sv241_api::{Error, ProxyClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ProxyClient) {
    let server = MockServer::start().await;
    let client = ProxyClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

// ── Settings ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_settings() {
    let (server, client) = setup().await;

    let body = json!({
        "proxy_config": {
            "serialPortName": "COM3",
            "autoDetectPort": true,
            "networkPort": 8080,
            "listenAddress": "0.0.0.0",
            "logLevel": "INFO",
            "switchNames": { "dc1": "Mount" },
            "heaterAutoEnableLeader": { "pwm1": true, "pwm2": false }
        },
        "available_ips": ["192.168.1.20"],
        "serial_port_connected": true,
        "reconnect_paused": false
    });

    Mock::given(method("GET"))
        .and(path("/api/v1/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let settings = client.get_settings().await.unwrap();
    let proxy = settings.proxy_config.unwrap();
    assert_eq!(proxy.serial_port_name, "COM3");
    assert_eq!(proxy.network_port, 8080);
    assert_eq!(proxy.switch_names["dc1"], "Mount");
    assert!(settings.serial_port_connected);
    assert_eq!(settings.available_ips, vec!["192.168.1.20".to_owned()]);
}

#[tokio::test]
async fn test_save_proxy_config_posts_whole_document() {
    let (server, client) = setup().await;

    let config = ProxyConfig {
        serial_port_name: "COM4".into(),
        network_port: 8080,
        listen_address: "127.0.0.1".into(),
        log_level: "DEBUG".into(),
        ..ProxyConfig::default()
    };

    Mock::given(method("POST"))
        .and(path("/api/v1/settings"))
        .and(body_string_contains("\"serialPortName\":\"COM4\""))
        .and(body_string_contains("\"logLevel\":\"DEBUG\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.save_proxy_config(&config).await.unwrap();
}

#[tokio::test]
async fn test_http_error_keeps_proxy_message() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/settings"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Invalid Listen Address\n"))
        .mount(&server)
        .await;

    let err = client
        .save_proxy_config(&ProxyConfig::default())
        .await
        .unwrap_err();

    match err {
        Error::Http { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "Invalid Listen Address");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

// ── Device config ───────────────────────────────────────────────────

#[tokio::test]
async fn test_set_config_returns_echoed_config() {
    let (server, client) = setup().await;

    let patch = json!({ "av": 12.0 });
    let echo = json!({
        "av": 11.9,
        "dh": [{ "n": "Main", "m": 0 }, { "n": "Guide", "m": 5 }]
    });

    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .and(body_json(&patch))
        .respond_with(ResponseTemplate::new(200).set_body_json(&echo))
        .expect(1)
        .mount(&server)
        .await;

    let config = client.set_config(&patch).await.unwrap().unwrap();
    assert_eq!(config.adjustable_voltage, Some(11.9));
    assert_eq!(config.dew_heaters[1].mode, HeaterMode::Disabled);
}

#[tokio::test]
async fn test_set_config_tolerates_plain_ack() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;

    assert!(client.set_config(&json!({ "av": 5 })).await.unwrap().is_none());
}

#[tokio::test]
async fn test_deserialization_error_keeps_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/config"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    match client.get_config().await.unwrap_err() {
        Error::Deserialization { body, .. } => assert_eq!(body, "not json"),
        other => panic!("expected Deserialization error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_versions() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/firmware/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "1.4.2" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/proxy/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "2.0.0" })))
        .mount(&server)
        .await;

    assert_eq!(client.get_firmware_version().await.unwrap(), "1.4.2");
    assert_eq!(client.get_proxy_version().await.unwrap(), "2.0.0");
}

// ── Power ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_switch_sends_form() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/switch/0/setswitchvalue"))
        .and(body_string_contains("Id=2"))
        .and(body_string_contains("State=true"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ErrorNumber": 0, "ErrorMessage": "" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    client.set_switch(2, true).await.unwrap();
}

#[tokio::test]
async fn test_set_switch_value_surfaces_alpaca_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/switch/0/setswitchvalue"))
        .and(body_string_contains("Value=12.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ErrorNumber": 1025,
            "ErrorMessage": "Value out of range"
        })))
        .mount(&server)
        .await;

    match client.set_switch_value(7, 12.5).await.unwrap_err() {
        Error::Alpaca { code, message } => {
            assert_eq!(code, 1025);
            assert_eq!(message, "Value out of range");
        }
        other => panic!("expected Alpaca error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_set_all_power() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/power/all"))
        .and(body_json(json!({ "state": false })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.set_all_power(false).await.unwrap();
}

#[tokio::test]
async fn test_power_status_unavailable_is_http_503() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/power/status"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string("Status cache is not yet populated"),
        )
        .mount(&server)
        .await;

    let err = client.get_power_status().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.is_transient());
}

// ── Telemetry ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_history_default_window() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/telemetry/history"))
        .and(query_param("duration", "12h"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "t": 1_700_000_000, "v": 12.3, "c": 1.1, "p": 13.5, "temp": 8.0,
              "hum": 70.0, "dew": 3.0, "lens": 9.0, "pwm1": 40, "pwm2": 0 }
        ])))
        .mount(&server)
        .await;

    let points = client
        .get_telemetry_history(&HistoryQuery::default())
        .await
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].timestamp, 1_700_000_000);
    assert!((points[0].pwm1 - 40.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_history_null_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/telemetry/history"))
        .and(query_param("date", "2024-03-09"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/telemetry/dates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["2024-03-09"])))
        .mount(&server)
        .await;

    let points = client
        .get_telemetry_history(&HistoryQuery::Date("2024-03-09".into()))
        .await
        .unwrap();
    assert!(points.is_empty());
    assert_eq!(client.get_telemetry_dates().await.unwrap(), vec!["2024-03-09".to_owned()]);
}

#[tokio::test]
async fn test_download_url_and_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/telemetry/download"))
        .and(query_param("date", "2024-03-09"))
        .respond_with(ResponseTemplate::new(200).set_body_string("timestamp,v\n1,12.0\n"))
        .mount(&server)
        .await;

    let url = client.telemetry_download_url("2024-03-09");
    assert!(url.as_str().ends_with("/api/v1/telemetry/download?date=2024-03-09"));
    let csv = client.download_telemetry("2024-03-09").await.unwrap();
    assert!(csv.starts_with("timestamp"));
}

// ── System ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_command_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/command"))
        .and(body_json(json!({ "command": "dry_sensor" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":\"ok\"}"))
        .expect(1)
        .mount(&server)
        .await;

    client.send_command(DeviceCommand::DrySensor).await.unwrap();
}

#[tokio::test]
async fn test_restore_rejects_incomplete_backup_without_sending() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/backup/restore"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client
        .restore_backup(r#"{ "proxyConfig": { "logLevel": "INFO" } }"#)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    let err = client.restore_backup("{ broken").await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn test_backup_roundtrip_through_proxy() {
    let (server, client) = setup().await;

    let backup = json!({
        "proxyConfig": { "logLevel": "INFO", "networkPort": 8080 },
        "firmwareConfig": { "av": 12.0 }
    });

    Mock::given(method("GET"))
        .and(path("/api/v1/backup/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&backup))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/backup/restore"))
        .and(body_json(&backup))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Configuration restored successfully. Connected to COM3."),
        )
        .expect(1)
        .mount(&server)
        .await;

    let content = client.create_backup().await.unwrap();
    let message = client.restore_backup(&content).await.unwrap();
    assert_eq!(message, "Configuration restored successfully. Connected to COM3.");
}
