//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use sv241_config::ConfigError;
use sv241_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_CONNECTED: i32 = 3;
    pub const COMMAND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the proxy at {url}")]
    #[diagnostic(
        code(sv241::connection_failed),
        help(
            "Check that the SV241 proxy is running and reachable.\n\
             Try: sv241 --proxy http://<host>:8080 status"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(sv241::timeout),
        help("Increase the timeout with --timeout or check the proxy's responsiveness.")
    )]
    Timeout,

    #[error("Device is not connected (proxy reports: {state})")]
    #[diagnostic(
        code(sv241::not_connected),
        help(
            "The proxy has no serial link to the device right now.\n\
             Run: sv241 status"
        )
    )]
    DeviceNotConnected { state: String },

    // ── Proxy ────────────────────────────────────────────────────────
    #[error("Proxy error: {message}")]
    #[diagnostic(code(sv241::api_error))]
    ApiError { message: String },

    #[error("{command} failed: {message}")]
    #[diagnostic(code(sv241::command_failed))]
    CommandFailed { command: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sv241::validation))]
    Validation { field: String, reason: String },

    #[error("Nothing to save for {section}: the configuration has not been loaded")]
    #[diagnostic(
        code(sv241::not_loaded),
        help("The proxy has not cached the device configuration yet. Try again shortly.")
    )]
    NotLoaded { section: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(sv241::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: sv241 profile add <name> --url <proxy url>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No proxy configured")]
    #[diagnostic(
        code(sv241::no_config),
        help(
            "Pass --proxy, set SV241_PROXY, or add a profile with:\n\
             sv241 profile add default --url http://<host>:8080\n\
             Config file: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(sv241::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(sv241::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(sv241::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::DeviceNotConnected { .. } => exit_code::NOT_CONNECTED,
            Self::CommandFailed { .. } => exit_code::COMMAND,
            Self::Validation { .. }
            | Self::NotLoaded { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. }
            | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Timeout => Self::Timeout,
            CoreError::Api { message, .. } => Self::ApiError { message },
            CoreError::Validation { field, reason, .. } => Self::Validation { field, reason },
            CoreError::UnknownField(field) => Self::Validation {
                field,
                reason: "unknown configuration field".into(),
            },
            CoreError::NotLoaded { section } => Self::NotLoaded {
                section: section.to_string(),
            },
            CoreError::DeviceNotConnected { state } => Self::DeviceNotConnected {
                state: state.to_string(),
            },
            CoreError::CommandFailed { command, message } => {
                Self::CommandFailed { command, message }
            }
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}
