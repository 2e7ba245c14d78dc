#![allow(clippy::unwrap_used)]
// Integration tests for `DashboardSession` against a mock proxy.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sv241_api::ProxyClient;
use sv241_core::{
    ConfigField, ConfigSection, ConnectionState, CoreError, DashboardSession, DeviceCommand,
    HeaterMode, HeaterSlot, SessionConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, DashboardSession) {
    let server = MockServer::start().await;
    let client = ProxyClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    let mut config = SessionConfig::new(server.uri().parse().unwrap());
    config.polling_enabled = false;
    config.log_stream_enabled = false;
    (server, DashboardSession::with_client(config, client))
}

fn settings(serial_connected: bool) -> Value {
    json!({
        "proxy_config": {
            "serialPortName": "COM3",
            "networkPort": 8080,
            "listenAddress": "0.0.0.0",
            "logLevel": "INFO",
            "switchNames": { "dc1": "Mount" },
            "heaterAutoEnableLeader": { "pwm1": false, "pwm2": false }
        },
        "serial_port_connected": serial_connected,
        "reconnect_paused": false
    })
}

fn device_config() -> Value {
    json!({
        "so": { "st": 0.0, "sh": 0.0, "dt": 0.0, "iv": 0.0, "ic": 0.0 },
        "ad": { "en": 1, "ht": 95.0, "td": 300 },
        "av": 12.0,
        "dh": [
            { "n": "Main", "en": 1, "m": 1, "mp": 50, "xp": 100 },
            { "n": "Guide", "en": 1, "m": 0, "mp": 30, "xp": 100 }
        ]
    })
}

async fn mount_get(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// A connected proxy with a loaded device configuration.
async fn mount_connected(server: &MockServer) {
    mount_get(server, "/api/v1/settings", settings(true)).await;
    mount_get(server, "/api/v1/config", device_config()).await;
    mount_get(server, "/api/v1/firmware/version", json!({ "version": "1.4.2" })).await;
    mount_get(server, "/api/v1/status", json!({ "v": 12.4, "i": 850.0, "t_lens": 6.5 })).await;
    mount_get(server, "/api/v1/power/status", json!({ "d1": 1, "d2": 0 })).await;
    mount_get(server, "/api/v1/proxy/version", json!({ "version": "2.0.0" })).await;
}

fn field(path: &str) -> ConfigField {
    path.parse().unwrap()
}

// ── Reload & connection gating ──────────────────────────────────────

#[tokio::test]
async fn test_reload_populates_read_models_when_connected() {
    let (server, session) = setup().await;
    mount_connected(&server).await;

    assert_eq!(session.reload().await, ConnectionState::Connected);

    assert_eq!(session.current_state(), ConnectionState::Connected);
    assert_eq!(session.port_label(), "COM3");
    assert_eq!(session.firmware_version().borrow().as_deref(), Some("1.4.2"));
    assert_eq!(session.proxy_version().borrow().as_deref(), Some("2.0.0"));
    let status = session.live_status().borrow().clone().unwrap();
    assert_eq!(status.current_amps(), Some(0.85));
    let power = session.power_status().borrow().clone().unwrap();
    assert_eq!(power.is_on("d1"), Some(true));
    let config = session.remote_config().borrow().clone().unwrap();
    assert_eq!(config.heater_modes(), [HeaterMode::PidLensSensor, HeaterMode::Manual]);
}

#[tokio::test]
async fn test_failed_settings_poll_is_offline_and_skips_device_fetches() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/settings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/firmware/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "x" })))
        .expect(0)
        .mount(&server)
        .await;

    assert_eq!(session.reload().await, ConnectionState::Offline);
    assert_eq!(session.port_label(), "Proxy Offline");
    assert!(session.remote_config().borrow().is_none());
}

#[tokio::test]
async fn test_offline_then_recovered_follows_the_rules() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/settings"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_get(&server, "/api/v1/settings", settings(false)).await;

    assert_eq!(session.reload().await, ConnectionState::Offline);
    assert_eq!(session.reload().await, ConnectionState::Connecting);
    assert_eq!(session.port_label(), "Connecting to COM3...");
}

// ── Saving ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_save_posts_only_the_saved_section() {
    let (server, session) = setup().await;
    mount_connected(&server).await;
    session.reload().await;

    session.edit(field("ad.ht"), "90").await.unwrap();
    session.edit(field("so.st"), "0,5").await.unwrap();

    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .and(body_json(json!({ "ad": { "en": true, "ht": 90.0, "td": 300 } })))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = session.save_section(ConfigSection::AutoDry).await.unwrap();
    assert_eq!(outcome.section, ConfigSection::AutoDry);
    assert!(outcome.device_config.is_some());

    let dirty: Vec<_> = session.dirty_sections().borrow().iter().copied().collect();
    assert_eq!(dirty, vec![ConfigSection::Sensors]);
}

#[tokio::test]
async fn test_overlapping_saves_survive_a_failed_re_read() {
    let (server, session) = setup().await;
    mount_get(&server, "/api/v1/settings", settings(true)).await;
    mount_get(&server, "/api/v1/firmware/version", json!({ "version": "1.4.2" })).await;
    mount_get(&server, "/api/v1/status", json!({ "v": 12.4 })).await;
    mount_get(&server, "/api/v1/power/status", json!({ "d1": 1 })).await;
    mount_get(&server, "/api/v1/proxy/version", json!({ "version": "2.0.0" })).await;

    // Reload, then the sensor save's re-read, then every later read fails.
    let mut saved_offset = device_config();
    saved_offset["so"]["st"] = json!(0.5);
    Mock::given(method("GET"))
        .and(path("/api/v1/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_config()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(saved_offset))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/config"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .and(body_string_contains("\"so\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .and(body_string_contains("\"ad\""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("OK")
                .set_delay(std::time::Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(session.reload().await, ConnectionState::Connected);
    session.edit(field("so.st"), "0,5").await.unwrap();
    session.edit(field("ad.ht"), "90").await.unwrap();

    let (sensors, auto_dry) = tokio::join!(
        session.save_section(ConfigSection::Sensors),
        session.save_section(ConfigSection::AutoDry),
    );
    sensors.unwrap();
    auto_dry.unwrap();

    let draft = serde_json::to_value(session.draft_device().await.unwrap()).unwrap();
    assert_eq!(draft["so"]["st"], json!(0.5));
    assert_eq!(draft["ad"]["ht"], json!(90.0));
    assert!(session.dirty_sections().borrow().is_empty());
}

#[tokio::test]
async fn test_device_save_refused_unless_connected() {
    let (server, session) = setup().await;
    mount_get(&server, "/api/v1/settings", settings(false)).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert_eq!(session.reload().await, ConnectionState::Connecting);
    session.edit(field("av"), "9").await.unwrap();

    let err = session
        .save_section(ConfigSection::AdjustableVoltage)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::DeviceNotConnected {
            state: ConnectionState::Connecting
        }
    ));
    assert!(session.dirty_sections().borrow().contains(&ConfigSection::AdjustableVoltage));
}

#[tokio::test]
async fn test_failed_save_keeps_section_dirty() {
    let (server, session) = setup().await;
    mount_connected(&server).await;
    session.reload().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Device not connected"))
        .mount(&server)
        .await;

    session.edit(field("ad.td"), "120").await.unwrap();
    let err = session.save_section(ConfigSection::AutoDry).await.unwrap_err();
    assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    assert!(session.dirty_sections().borrow().contains(&ConfigSection::AutoDry));
}

#[tokio::test]
async fn test_validation_error_sends_nothing() {
    let (server, session) = setup().await;
    mount_connected(&server).await;
    session.reload().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    session.edit(field("dh.0.mp"), "lots").await.unwrap();
    let err = session.save_section(ConfigSection::DewHeaters).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation {
            section: ConfigSection::DewHeaters,
            ..
        }
    ));
}

#[tokio::test]
async fn test_dew_heater_save_also_saves_leader_flags() {
    let (server, session) = setup().await;
    mount_connected(&server).await;
    session.reload().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .and(body_string_contains("\"dh\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings"))
        .and(body_string_contains("\"pwm2\":true"))
        .and(body_string_contains("\"serialPortName\":\"COM3\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    session.edit(field("dh.1.leader"), true).await.unwrap();
    session.edit(field("dh.1.mp"), "45").await.unwrap();
    let outcome = session.save_section(ConfigSection::DewHeaters).await.unwrap();
    assert!(outcome.leader_flags_error.is_none());
    assert!(session.dirty_sections().borrow().is_empty());
}

#[tokio::test]
async fn test_dew_heater_save_without_leader_edit_leaves_proxy_alone() {
    let (server, session) = setup().await;
    mount_connected(&server).await;
    session.reload().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/config/set"))
        .and(body_string_contains("\"dh\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    session.edit(field("dh.0.mp"), "40").await.unwrap();
    let outcome = session.save_section(ConfigSection::DewHeaters).await.unwrap();
    assert!(outcome.leader_flags_error.is_none());
    assert!(session.dirty_sections().borrow().is_empty());
}

#[tokio::test]
async fn test_proxy_section_saves_while_device_is_away() {
    let (server, session) = setup().await;
    mount_get(&server, "/api/v1/settings", settings(false)).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/settings"))
        .and(body_string_contains("\"dc1\":\"Scope\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    session.reload().await;
    session.edit(field("names.dc1"), "Scope").await.unwrap();
    session.save_section(ConfigSection::SwitchNames).await.unwrap();
    assert!(session.dirty_sections().borrow().is_empty());
}

// ── Heater options ──────────────────────────────────────────────────

#[tokio::test]
async fn test_heater_options_follow_edits() {
    let (server, session) = setup().await;
    mount_connected(&server).await;
    session.reload().await;

    let solution = session
        .edit_heater_mode(HeaterSlot::Second, HeaterMode::MinimumTemperature)
        .await;
    assert!(solution.was_reset(HeaterSlot::Second));

    let options = *session.allowed_heater_options().borrow();
    let second = options.slot(HeaterSlot::Second);
    assert_eq!(second.mode, HeaterMode::Manual);
    assert!(second.allows(HeaterMode::SyncFollower));
    assert!(!second.allows(HeaterMode::MinimumTemperature));
}

// ── Commands, backups, power ────────────────────────────────────────

#[tokio::test]
async fn test_command_failure_is_surfaced() {
    let (server, session) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/command"))
        .and(body_json(json!({ "command": "dry_sensor" })))
        .respond_with(ResponseTemplate::new(500).set_body_string("serial write failed"))
        .mount(&server)
        .await;

    match session.send_command(DeviceCommand::DrySensor).await.unwrap_err() {
        CoreError::CommandFailed { command, message } => {
            assert_eq!(command, "dry sensor");
            assert!(message.contains("serial write failed"), "{message}");
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_incomplete_backup_is_never_sent() {
    let (server, session) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/backup/restore"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = session
        .restore_backup(r#"{"proxyConfig": {}}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CommandFailed { .. }));
}

#[tokio::test]
async fn test_set_switch_refreshes_power() {
    let (server, session) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/switch/0/setswitchvalue"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ErrorNumber": 0, "ErrorMessage": "" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/power/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "d3": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    session.set_switch(2, true).await.unwrap();
    let power = session.power_status().borrow().clone().unwrap();
    assert_eq!(power.is_on("d3"), Some(true));
}

// ── Telemetry ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_select_history_date_switches_the_query() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/telemetry/history"))
        .and(query_param("date", "2024-05-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "t": 1_714_600_000, "v": 12.2, "lens": 3.5 },
            { "t": 1_714_590_000, "v": 12.3, "lens": 3.9 }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(&server, "/api/v1/telemetry/dates", json!(["2024-05-01"])).await;

    session
        .select_history_date(Some("2024-05-01".into()))
        .await;

    let series = session.telemetry_series().borrow().clone();
    assert_eq!(series.len(), 2);
    assert!(series[0].timestamp < series[1].timestamp);
    assert_eq!(session.available_dates().borrow().as_slice(), ["2024-05-01".to_owned()]);
}
