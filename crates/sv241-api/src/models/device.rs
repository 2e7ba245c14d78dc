// Device configuration (`GET /config`, `POST /config/set`)
//
// Short keys are the firmware's own; the proxy passes them through.
// `POST /config/set` takes any subset of the top-level keys and merges it
// field by field on the device, so partial patches are safe.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::EnumIter;

use super::{flex_bool, null_default};

/// Number of dew-heater slots on the box.
pub const HEATER_SLOT_COUNT: usize = 2;

/// Keys of the `ps` (power-on state) object, in panel order.
pub const STARTUP_SWITCH_KEYS: [&str; 8] = ["d1", "d2", "d3", "d4", "d5", "u12", "u34", "adj"];

// ── RemoteConfig ────────────────────────────────────────────────────

/// Full device configuration as last fetched from the proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(rename = "so", default, skip_serializing_if = "Option::is_none")]
    pub sensor_offsets: Option<SensorOffsets>,
    #[serde(rename = "ui", default, skip_serializing_if = "Option::is_none")]
    pub update_intervals: Option<UpdateIntervals>,
    #[serde(rename = "ac", default, skip_serializing_if = "Option::is_none")]
    pub averaging_counts: Option<AveragingCounts>,
    #[serde(
        rename = "dh",
        default,
        deserialize_with = "null_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub dew_heaters: Vec<HeaterSetting>,
    #[serde(rename = "ps", default, skip_serializing_if = "Option::is_none")]
    pub power_startup: Option<BTreeMap<String, StartupState>>,
    #[serde(rename = "ad", default, skip_serializing_if = "Option::is_none")]
    pub auto_dry: Option<AutoDry>,
    /// Adjustable converter preset voltage.
    #[serde(rename = "av", default, skip_serializing_if = "Option::is_none")]
    pub adjustable_voltage: Option<f64>,
    /// Keys this client does not model. Written back untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteConfig {
    /// An empty object is what the proxy returns before its cache fills.
    pub fn is_empty(&self) -> bool {
        self.sensor_offsets.is_none()
            && self.update_intervals.is_none()
            && self.averaging_counts.is_none()
            && self.dew_heaters.is_empty()
            && self.power_startup.is_none()
            && self.auto_dry.is_none()
            && self.adjustable_voltage.is_none()
            && self.extra.is_empty()
    }

    /// Heater modes per slot, `Manual` for any slot the device did not report.
    pub fn heater_modes(&self) -> [HeaterMode; HEATER_SLOT_COUNT] {
        let mut modes = [HeaterMode::Manual; HEATER_SLOT_COUNT];
        for (mode, heater) in modes.iter_mut().zip(&self.dew_heaters) {
            *mode = heater.mode;
        }
        modes
    }
}

/// Sensor calibration offsets (`so`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorOffsets {
    #[serde(rename = "st")]
    pub sht40_temp: f64,
    #[serde(rename = "sh")]
    pub sht40_humidity: f64,
    #[serde(rename = "dt")]
    pub ds18b20_temp: f64,
    #[serde(rename = "iv")]
    pub ina219_voltage: f64,
    #[serde(rename = "ic")]
    pub ina219_current: f64,
}

/// Sensor update intervals in milliseconds (`ui`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateIntervals {
    #[serde(rename = "i")]
    pub ina219: u64,
    #[serde(rename = "s")]
    pub sht40: u64,
    #[serde(rename = "d")]
    pub ds18b20: u64,
}

/// Moving-average window sizes (`ac`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AveragingCounts {
    #[serde(rename = "st")]
    pub sht40_temp: u32,
    #[serde(rename = "sh")]
    pub sht40_humidity: u32,
    #[serde(rename = "dt")]
    pub ds18b20_temp: u32,
    #[serde(rename = "iv")]
    pub ina219_voltage: u32,
    #[serde(rename = "ic")]
    pub ina219_current: u32,
}

/// SHT40 auto-dry (`ad`). `td` is in seconds; the device caps it at 600.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoDry {
    #[serde(rename = "en", with = "flex_bool")]
    pub enabled: bool,
    #[serde(rename = "ht")]
    pub humidity_threshold: f64,
    #[serde(rename = "td")]
    pub trigger_duration_secs: u64,
}

// ── Dew heaters ─────────────────────────────────────────────────────

/// One entry of the `dh` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaterSetting {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "en", with = "flex_bool")]
    pub enabled_on_startup: bool,
    #[serde(rename = "m")]
    pub mode: HeaterMode,
    /// Manual power in percent.
    #[serde(rename = "mp")]
    pub manual_power: u8,
    #[serde(rename = "to")]
    pub target_offset: f64,
    #[serde(rename = "kp")]
    pub pid_kp: f64,
    #[serde(rename = "ki")]
    pub pid_ki: f64,
    #[serde(rename = "kd")]
    pub pid_kd: f64,
    #[serde(rename = "sd")]
    pub start_delta: f64,
    #[serde(rename = "ed")]
    pub end_delta: f64,
    /// Upper power bound in percent for the automatic modes.
    #[serde(rename = "xp")]
    pub max_power: u8,
    #[serde(rename = "psf")]
    pub pid_sync_factor: f64,
    #[serde(rename = "mt")]
    pub min_temp: f64,
}

/// Heater control mode. The numeric values are the firmware's wire contract.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum HeaterMode {
    #[default]
    Manual = 0,
    PidLensSensor = 1,
    Off = 2,
    SyncFollower = 3,
    MinimumTemperature = 4,
    Disabled = 5,
}

impl HeaterMode {
    /// Short token used on the command line and in logs.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::PidLensSensor => "pid",
            Self::Off => "off",
            Self::SyncFollower => "sync",
            Self::MinimumTemperature => "min-temp",
            Self::Disabled => "disabled",
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl From<HeaterMode> for u8 {
    fn from(mode: HeaterMode) -> Self {
        mode.code()
    }
}

impl TryFrom<u8> for HeaterMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Manual),
            1 => Ok(Self::PidLensSensor),
            2 => Ok(Self::Off),
            3 => Ok(Self::SyncFollower),
            4 => Ok(Self::MinimumTemperature),
            5 => Ok(Self::Disabled),
            other => Err(format!("unknown heater mode {other}")),
        }
    }
}

impl fmt::Display for HeaterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Manual => "Manual",
            Self::PidLensSensor => "PID (lens sensor)",
            Self::Off => "Off",
            Self::SyncFollower => "PID sync (follower)",
            Self::MinimumTemperature => "Minimum temperature",
            Self::Disabled => "Disabled",
        };
        f.write_str(label)
    }
}

impl FromStr for HeaterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::try_from(code);
        }
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "manual" => Ok(Self::Manual),
            "pid" | "pid-lens-sensor" | "pid-lenssensor" => Ok(Self::PidLensSensor),
            "off" => Ok(Self::Off),
            "sync" | "sync-follower" | "follower" => Ok(Self::SyncFollower),
            "min-temp" | "minimum-temperature" | "minimumtemperature" => {
                Ok(Self::MinimumTemperature)
            }
            "disabled" => Ok(Self::Disabled),
            _ => Err(format!("unknown heater mode '{s}'")),
        }
    }
}

// ── Power-on states ─────────────────────────────────────────────────

/// Power-on state of a switchable output (`ps`): 0 off, 1 on, 2 disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StartupState {
    #[default]
    Off,
    On,
    Disabled,
}

impl StartupState {
    pub const fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::Disabled => 2,
        }
    }

    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            2 => Some(Self::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for StartupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Disabled => "disabled",
        })
    }
}

impl FromStr for StartupState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "off" | "false" => Ok(Self::Off),
            "1" | "on" | "true" => Ok(Self::On),
            "2" | "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown power-on state '{other}'")),
        }
    }
}

impl Serialize for StartupState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for StartupState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(true) => Ok(Self::On),
            Raw::Bool(false) => Ok(Self::Off),
            Raw::Int(code) => Self::from_code(code)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid power-on state {code}"))),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
