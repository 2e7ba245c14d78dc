//! Shared configuration for the SV241 tools.
//!
//! TOML profiles merged over built-in defaults and `SV241_`-prefixed
//! environment variables, and translation to `sv241_core::SessionConfig`.
//! The CLI layers its own flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sv241_core::{HistoryQuery, SessionConfig};

/// Name used when neither the file nor the command line picks a profile.
pub const DEFAULT_PROFILE: &str = "default";

const MIN_POLL_INTERVAL_MS: u64 = 250;
const LOG_RECONNECT_RANGE_SECS: std::ops::RangeInclusive<u64> = 2..=3;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named proxy profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some(DEFAULT_PROFILE.into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Pick a profile: the explicit name, else `default_profile`, else "default".
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or(DEFAULT_PROFILE)
            .to_owned();
        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::ProfileNotFound { name }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// A named proxy profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Proxy base URL (e.g., "http://192.168.1.20:8080").
    pub proxy: String,

    /// Override the request timeout, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Settings/status poll cadence in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Telemetry history cadence in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_interval_secs: Option<u64>,

    /// Delay before the live log reconnects, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_reconnect_secs: Option<u64>,

    /// Lines kept in the live log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_capacity: Option<usize>,

    /// Default history window (e.g. "12h").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_duration: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "sv241", "sv241").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sv241");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file is not an error.
///
/// Environment overrides use a double underscore between levels, e.g.
/// `SV241_PROFILES__DEFAULT__PROXY`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SV241_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Parse and check a proxy address.
pub fn parse_proxy_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw
        .trim()
        .parse()
        .map_err(|_| invalid("proxy", format!("invalid URL: {raw}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            "proxy",
            format!("expected an http:// or https:// URL, got '{raw}'"),
        ));
    }
    Ok(url)
}

/// Build a `SessionConfig` from a profile. `defaults` supplies the
/// timeout when the profile has none.
pub fn profile_to_session_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let mut config = SessionConfig::new(parse_proxy_url(&profile.proxy)?);

    if let Some(secs) = profile.timeout.or(defaults.timeout) {
        if secs == 0 {
            return Err(invalid("timeout", "must be at least 1 second"));
        }
        config.timeout = Some(Duration::from_secs(secs));
    }

    if let Some(ms) = profile.poll_interval_ms {
        if ms < MIN_POLL_INTERVAL_MS {
            return Err(invalid(
                "poll_interval_ms",
                format!("must be at least {MIN_POLL_INTERVAL_MS}"),
            ));
        }
        config.poll_interval = Duration::from_millis(ms);
    }

    if let Some(secs) = profile.history_interval_secs {
        if secs == 0 {
            return Err(invalid("history_interval_secs", "must be at least 1"));
        }
        config.history_interval = Duration::from_secs(secs);
    }

    if let Some(secs) = profile.log_reconnect_secs {
        if !LOG_RECONNECT_RANGE_SECS.contains(&secs) {
            return Err(invalid(
                "log_reconnect_secs",
                format!(
                    "must be between {} and {}",
                    LOG_RECONNECT_RANGE_SECS.start(),
                    LOG_RECONNECT_RANGE_SECS.end()
                ),
            ));
        }
        config.log_reconnect_delay = Duration::from_secs(secs);
    }

    if let Some(capacity) = profile.log_capacity {
        if capacity == 0 {
            return Err(invalid("log_capacity", "must be at least 1"));
        }
        config.log_capacity = capacity;
    }

    if let Some(window) = &profile.history_duration {
        let window = window.trim();
        if !window.starts_with(|c: char| c.is_ascii_digit())
            || !window.ends_with(['h', 'm', 's'])
        {
            return Err(invalid(
                "history_duration",
                format!("expected a duration like '12h' or '90m', got '{window}'"),
            ));
        }
        config.default_history = HistoryQuery::Duration(window.to_owned());
    }

    Ok(config)
}

// ── Tests ───────────────────────────────────────────────────────────
