// Live readings, power state, telemetry history and device commands.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// `GET /status` body. The proxy returns `{}` until its cache has a reading,
/// which deserialises to every field `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    /// Input current in milliamps.
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub current_ma: Option<f64>,
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(rename = "t_amb", default, skip_serializing_if = "Option::is_none")]
    pub ambient_temp: Option<f64>,
    #[serde(rename = "h_amb", default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub dew_point: Option<f64>,
    #[serde(rename = "t_lens", default, skip_serializing_if = "Option::is_none")]
    pub lens_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwm1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwm2: Option<f64>,
}

impl LiveStatus {
    /// `false` while the proxy has not cached a reading yet.
    pub fn is_populated(&self) -> bool {
        self.voltage.is_some() || self.ambient_temp.is_some() || self.lens_temp.is_some()
    }

    pub fn current_amps(&self) -> Option<f64> {
        self.current_ma.map(|ma| ma / 1000.0)
    }
}

/// `GET /power/status`: short switch key → state value (`1` = on).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PowerStatus(pub BTreeMap<String, serde_json::Value>);

impl PowerStatus {
    /// State of one output, `None` if the key is absent or not numeric.
    pub fn is_on(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(value_is_on)
    }

    /// Every reported output is on. An empty report is not "all on".
    pub fn all_on(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(|v| value_is_on(v) == Some(true))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn value_is_on(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => n.as_f64().map(|f| (f - 1.0).abs() < f64::EPSILON),
        _ => None,
    }
}

/// One row of `GET /telemetry/history`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryPoint {
    /// Unix seconds.
    #[serde(rename = "t")]
    pub timestamp: i64,
    #[serde(rename = "v")]
    pub voltage: f64,
    #[serde(rename = "c")]
    pub current: f64,
    #[serde(rename = "p")]
    pub power: f64,
    pub temp: f64,
    pub hum: f64,
    pub dew: f64,
    pub lens: f64,
    pub pwm1: f64,
    pub pwm2: f64,
}

/// Which slice of telemetry history to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryQuery {
    /// One logged night, `YYYY-MM-DD`.
    Date(String),
    /// A trailing window such as `12h`.
    Duration(String),
}

impl HistoryQuery {
    pub const DEFAULT_DURATION: &'static str = "12h";

    /// The query-string pair sent to `/telemetry/history`.
    pub fn query_pair(&self) -> (&'static str, &str) {
        match self {
            Self::Date(date) => ("date", date),
            Self::Duration(window) => ("duration", window),
        }
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self::Duration(Self::DEFAULT_DURATION.to_owned())
    }
}

impl fmt::Display for HistoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "night of {date}"),
            Self::Duration(window) => write!(f, "last {window}"),
        }
    }
}

/// Body of `POST /command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DeviceCommand {
    Reboot,
    FactoryReset,
    DrySensor,
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reboot => "reboot",
            Self::FactoryReset => "factory reset",
            Self::DrySensor => "dry sensor",
        })
    }
}

/// `{ "version": "..." }` from the version endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct VersionResponse {
    #[serde(default)]
    pub version: String,
}
