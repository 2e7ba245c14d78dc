// Proxy-held settings (`GET /settings`, `POST /settings`) and backup files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::null_default;

/// The proxy's own configuration. `POST /settings` replaces the whole
/// document, so every known and unknown key is written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    pub serial_port_name: String,
    pub auto_detect_port: bool,
    pub network_port: u16,
    pub listen_address: String,
    pub log_level: String,
    #[serde(deserialize_with = "null_default")]
    pub switch_names: BTreeMap<String, String>,
    /// Keyed by `pwm1` / `pwm2`.
    #[serde(deserialize_with = "null_default")]
    pub heater_auto_enable_leader: BTreeMap<String, bool>,
    pub history_retention_nights: u32,
    /// Seconds between telemetry samples.
    pub telemetry_interval: u32,
    pub enable_alpaca_voltage_control: bool,
    pub enable_master_power: bool,
    pub enable_notifications: bool,
    pub first_run_complete: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProxyConfig {
    /// The configured serial port, if any.
    pub fn port_name(&self) -> Option<&str> {
        let name = self.serial_port_name.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// `GET /settings` response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsResponse {
    pub proxy_config: Option<ProxyConfig>,
    #[serde(deserialize_with = "null_default")]
    pub active_switches: BTreeMap<String, serde_json::Value>,
    #[serde(deserialize_with = "null_default")]
    pub available_ips: Vec<String>,
    pub serial_port_connected: bool,
    pub reconnect_paused: bool,
}

/// Backup document produced by `GET /backup/create`.
///
/// Both halves are kept as raw JSON: the firmware half is restored to the
/// device byte for byte and must not be normalised on the way through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupFile {
    #[serde(rename = "proxyConfig", default, skip_serializing_if = "Option::is_none")]
    pub proxy_config: Option<serde_json::Value>,
    #[serde(rename = "firmwareConfig", default, skip_serializing_if = "Option::is_none")]
    pub firmware_config: Option<serde_json::Value>,
}

impl BackupFile {
    /// The proxy refuses a backup unless both halves are present.
    pub fn is_restorable(&self) -> bool {
        self.proxy_config.as_ref().is_some_and(serde_json::Value::is_object)
            && self.firmware_config.as_ref().is_some_and(|v| !v.is_null())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_tolerate_go_nulls() {
        let raw = json!({
            "proxy_config": {
                "serialPortName": "COM3",
                "switchNames": null,
                "heaterAutoEnableLeader": { "pwm1": true },
                "futureFlag": 7
            },
            "available_ips": null,
            "serial_port_connected": true
        });

        let settings: SettingsResponse = serde_json::from_value(raw).unwrap();
        let proxy = settings.proxy_config.as_ref().unwrap();
        assert_eq!(proxy.port_name(), Some("COM3"));
        assert!(proxy.switch_names.is_empty());
        assert!(proxy.heater_auto_enable_leader["pwm1"]);
        assert_eq!(proxy.extra["futureFlag"], json!(7));
        assert!(settings.available_ips.is_empty());
        assert!(settings.serial_port_connected);
        assert!(!settings.reconnect_paused);
    }

    #[test]
    fn proxy_config_writes_camel_case_and_extras() {
        let mut config = ProxyConfig {
            log_level: "DEBUG".into(),
            ..ProxyConfig::default()
        };
        config.extra.insert("futureFlag".into(), json!(true));

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["logLevel"], json!("DEBUG"));
        assert_eq!(value["futureFlag"], json!(true));
        assert!(value.get("log_level").is_none());
    }

    #[test]
    fn blank_port_name_is_none() {
        let config = ProxyConfig {
            serial_port_name: "  ".into(),
            ..ProxyConfig::default()
        };
        assert_eq!(config.port_name(), None);
    }

    #[test]
    fn backup_needs_both_halves() {
        let backup: BackupFile =
            serde_json::from_value(json!({ "proxyConfig": {}, "firmwareConfig": { "av": 5 } }))
                .unwrap();
        assert!(backup.is_restorable());
        let backup: BackupFile = serde_json::from_value(json!({ "firmwareConfig": {} })).unwrap();
        assert!(!backup.is_restorable());
        let backup: BackupFile = serde_json::from_value(json!({ "other": 1 })).unwrap();
        assert!(!backup.is_restorable());
    }
}
