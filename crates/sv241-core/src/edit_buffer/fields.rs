// Field addressing and value parsing for the edit buffer.
//
// Fields are addressed by dotted paths that mirror the wire keys
// (`so.st`, `dh.1.kp`, `ps.d3`, `proxy.logLevel`, `names.dc1`), so the same
// strings work on the command line and in logs.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use sv241_api::models::{HeaterMode, STARTUP_SWITCH_KEYS, StartupState};

use crate::error::CoreError;
use crate::heater::HeaterSlot;

// ── Sections ─────────────────────────────────────────────────────

/// Unit of dirty tracking and of saving.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigSection {
    /// Offsets, update intervals and averaging counts (`so`, `ui`, `ac`).
    Sensors,
    /// Both heater slots (`dh`) plus the proxy's auto-enable-leader flags.
    DewHeaters,
    /// Adjustable converter preset (`av`).
    AdjustableVoltage,
    /// Power-on states (`ps`).
    PowerStartup,
    /// SHT40 auto-dry (`ad`).
    AutoDry,
    /// Proxy network, serial and logging settings.
    ProxySettings,
    /// Display names for the switchable outputs.
    SwitchNames,
}

impl ConfigSection {
    /// Sections whose primary data lives on the device.
    pub const fn is_device_bound(self) -> bool {
        !matches!(self, Self::ProxySettings | Self::SwitchNames)
    }
}

// ── Field addresses ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensorChannel {
    Sht40Temp,
    Sht40Humidity,
    Ds18b20Temp,
    Ina219Voltage,
    Ina219Current,
}

impl SensorChannel {
    const ALL: [Self; 5] = [
        Self::Sht40Temp,
        Self::Sht40Humidity,
        Self::Ds18b20Temp,
        Self::Ina219Voltage,
        Self::Ina219Current,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Sht40Temp => "st",
            Self::Sht40Humidity => "sh",
            Self::Ds18b20Temp => "dt",
            Self::Ina219Voltage => "iv",
            Self::Ina219Current => "ic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntervalChannel {
    Ina219,
    Sht40,
    Ds18b20,
}

impl IntervalChannel {
    const ALL: [Self; 3] = [Self::Ina219, Self::Sht40, Self::Ds18b20];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Ina219 => "i",
            Self::Sht40 => "s",
            Self::Ds18b20 => "d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaterField {
    Name,
    EnabledOnStartup,
    Mode,
    ManualPower,
    TargetOffset,
    Kp,
    Ki,
    Kd,
    StartDelta,
    EndDelta,
    MaxPower,
    PidSyncFactor,
    MinTemp,
    /// Proxy-held: switch this heater on when its leader starts.
    AutoEnableLeader,
}

impl HeaterField {
    const ALL: [Self; 14] = [
        Self::Name,
        Self::EnabledOnStartup,
        Self::Mode,
        Self::ManualPower,
        Self::TargetOffset,
        Self::Kp,
        Self::Ki,
        Self::Kd,
        Self::StartDelta,
        Self::EndDelta,
        Self::MaxPower,
        Self::PidSyncFactor,
        Self::MinTemp,
        Self::AutoEnableLeader,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "n",
            Self::EnabledOnStartup => "en",
            Self::Mode => "m",
            Self::ManualPower => "mp",
            Self::TargetOffset => "to",
            Self::Kp => "kp",
            Self::Ki => "ki",
            Self::Kd => "kd",
            Self::StartDelta => "sd",
            Self::EndDelta => "ed",
            Self::MaxPower => "xp",
            Self::PidSyncFactor => "psf",
            Self::MinTemp => "mt",
            Self::AutoEnableLeader => "leader",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AutoDryField {
    Enabled,
    HumidityThreshold,
    TriggerDuration,
}

impl AutoDryField {
    const ALL: [Self; 3] = [Self::Enabled, Self::HumidityThreshold, Self::TriggerDuration];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Enabled => "en",
            Self::HumidityThreshold => "ht",
            Self::TriggerDuration => "td",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProxyField {
    ListenAddress,
    NetworkPort,
    SerialPortName,
    AutoDetectPort,
    LogLevel,
    HistoryRetentionNights,
    TelemetryInterval,
    EnableMasterPower,
    EnableAlpacaVoltageControl,
    EnableNotifications,
}

impl ProxyField {
    const ALL: [Self; 10] = [
        Self::ListenAddress,
        Self::NetworkPort,
        Self::SerialPortName,
        Self::AutoDetectPort,
        Self::LogLevel,
        Self::HistoryRetentionNights,
        Self::TelemetryInterval,
        Self::EnableMasterPower,
        Self::EnableAlpacaVoltageControl,
        Self::EnableNotifications,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::ListenAddress => "listenAddress",
            Self::NetworkPort => "networkPort",
            Self::SerialPortName => "serialPortName",
            Self::AutoDetectPort => "autoDetectPort",
            Self::LogLevel => "logLevel",
            Self::HistoryRetentionNights => "historyRetentionNights",
            Self::TelemetryInterval => "telemetryInterval",
            Self::EnableMasterPower => "enableMasterPower",
            Self::EnableAlpacaVoltageControl => "enableAlpacaVoltageControl",
            Self::EnableNotifications => "enableNotifications",
        }
    }
}

/// Address of one editable value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigField {
    SensorOffset(SensorChannel),
    UpdateInterval(IntervalChannel),
    AveragingCount(SensorChannel),
    Heater(HeaterSlot, HeaterField),
    /// Power-on state of one output, keyed by its `ps` key.
    StartupState(String),
    AdjustableVoltage,
    AutoDry(AutoDryField),
    Proxy(ProxyField),
    /// Display name of one output, keyed by its long switch key (`dc1`, ...).
    SwitchName(String),
}

impl ConfigField {
    pub fn section(&self) -> ConfigSection {
        match self {
            Self::SensorOffset(_) | Self::UpdateInterval(_) | Self::AveragingCount(_) => {
                ConfigSection::Sensors
            }
            Self::Heater(..) => ConfigSection::DewHeaters,
            Self::StartupState(_) => ConfigSection::PowerStartup,
            Self::AdjustableVoltage => ConfigSection::AdjustableVoltage,
            Self::AutoDry(_) => ConfigSection::AutoDry,
            Self::Proxy(_) => ConfigSection::ProxySettings,
            Self::SwitchName(_) => ConfigSection::SwitchNames,
        }
    }

    /// `true` when the value is persisted through `POST /settings`.
    pub fn is_proxy_bound(&self) -> bool {
        matches!(
            self,
            Self::Proxy(_) | Self::SwitchName(_) | Self::Heater(_, HeaterField::AutoEnableLeader)
        )
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorOffset(c) => write!(f, "so.{}", c.key()),
            Self::UpdateInterval(c) => write!(f, "ui.{}", c.key()),
            Self::AveragingCount(c) => write!(f, "ac.{}", c.key()),
            Self::Heater(slot, field) => write!(f, "dh.{}.{}", slot.index(), field.key()),
            Self::StartupState(key) => write!(f, "ps.{key}"),
            Self::AdjustableVoltage => f.write_str("av"),
            Self::AutoDry(field) => write!(f, "ad.{}", field.key()),
            Self::Proxy(field) => write!(f, "proxy.{}", field.key()),
            Self::SwitchName(key) => write!(f, "names.{key}"),
        }
    }
}

impl FromStr for ConfigField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || CoreError::UnknownField(s.to_owned());
        let parts: Vec<&str> = s.trim().split('.').collect();

        let field = match parts.as_slice() {
            ["so", key] => {
                Self::SensorOffset(find(&SensorChannel::ALL, key, SensorChannel::key).ok_or_else(unknown)?)
            }
            ["ui", key] => Self::UpdateInterval(
                find(&IntervalChannel::ALL, key, IntervalChannel::key).ok_or_else(unknown)?,
            ),
            ["ac", key] => Self::AveragingCount(
                find(&SensorChannel::ALL, key, SensorChannel::key).ok_or_else(unknown)?,
            ),
            ["dh", index, key] => {
                let slot = index
                    .parse::<usize>()
                    .ok()
                    .and_then(HeaterSlot::from_index)
                    .ok_or_else(unknown)?;
                let field = find(&HeaterField::ALL, key, HeaterField::key).ok_or_else(unknown)?;
                Self::Heater(slot, field)
            }
            ["ps", key] if STARTUP_SWITCH_KEYS.contains(key) => {
                Self::StartupState((*key).to_owned())
            }
            ["av"] => Self::AdjustableVoltage,
            ["ad", key] => {
                Self::AutoDry(find(&AutoDryField::ALL, key, AutoDryField::key).ok_or_else(unknown)?)
            }
            ["proxy", key] => {
                Self::Proxy(find(&ProxyField::ALL, key, ProxyField::key).ok_or_else(unknown)?)
            }
            ["names", key] if !key.is_empty() => Self::SwitchName((*key).to_owned()),
            _ => return Err(unknown()),
        };

        Ok(field)
    }
}

fn find<T: Copy>(all: &[T], key: &str, key_of: impl Fn(T) -> &'static str) -> Option<T> {
    all.iter()
        .copied()
        .find(|item| key_of(*item).eq_ignore_ascii_case(key))
}

// ── Values ───────────────────────────────────────────────────────

/// A pending value. Form input arrives as text and is only parsed when a
/// save is prepared, so a half-typed number never blocks other edits.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Mode(HeaterMode),
    Startup(StartupState),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<HeaterMode> for FieldValue {
    fn from(value: HeaterMode) -> Self {
        Self::Mode(value)
    }
}

impl From<StartupState> for FieldValue {
    fn from(value: StartupState) -> Self {
        Self::Startup(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Flag(flag) => write!(f, "{flag}"),
            Self::Mode(mode) => f.write_str(mode.token()),
            Self::Startup(state) => write!(f, "{state}"),
        }
    }
}

/// Why a value did not parse. Turned into `CoreError::Validation` by the
/// caller, which knows the field and section.
pub(crate) type ParseResult<T> = Result<T, String>;

impl FieldValue {
    /// Decimal number; a comma decimal separator is accepted.
    pub(crate) fn as_f64(&self) -> ParseResult<f64> {
        match self {
            Self::Text(text) => {
                let normalized = text.trim().replace(',', ".");
                let value: f64 = normalized
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", text.trim()))?;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(format!("'{}' is not a finite number", text.trim()))
                }
            }
            other => Err(format!("expected a number, got {other}")),
        }
    }

    /// Whole number within `min..=max`.
    pub(crate) fn as_int<T>(&self, min: i64, max: i64) -> ParseResult<T>
    where
        T: TryFrom<i64>,
    {
        let Self::Text(text) = self else {
            return Err(format!("expected a whole number, got {self}"));
        };
        let value: i64 = text
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a whole number", text.trim()))?;
        if value < min || value > max {
            return Err(format!("{value} is outside {min}..={max}"));
        }
        T::try_from(value).map_err(|_| format!("{value} is out of range"))
    }

    pub(crate) fn as_bool(&self) -> ParseResult<bool> {
        match self {
            Self::Flag(flag) => Ok(*flag),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Ok(true),
                "false" | "0" | "off" | "no" => Ok(false),
                other => Err(format!("'{other}' is not a boolean")),
            },
            other => Err(format!("expected a boolean, got {other}")),
        }
    }

    pub(crate) fn as_mode(&self) -> ParseResult<HeaterMode> {
        match self {
            Self::Mode(mode) => Ok(*mode),
            Self::Text(text) => text.parse(),
            other => Err(format!("expected a heater mode, got {other}")),
        }
    }

    pub(crate) fn as_startup(&self) -> ParseResult<StartupState> {
        match self {
            Self::Startup(state) => Ok(*state),
            Self::Flag(true) => Ok(StartupState::On),
            Self::Flag(false) => Ok(StartupState::Off),
            Self::Text(text) => text.parse(),
            Self::Mode(_) => Err(format!("expected a power-on state, got {self}")),
        }
    }

    pub(crate) fn as_text(&self) -> String {
        self.to_string()
    }

    pub(crate) fn as_ip(&self) -> ParseResult<String> {
        let text = self.as_text();
        let trimmed = text.trim();
        trimmed
            .parse::<IpAddr>()
            .map(|_| trimmed.to_owned())
            .map_err(|_| format!("'{trimmed}' is not an IP address"))
    }
}

// ── Tests ────────────────────────────────────────────────────────
