// ── Core error types ──
//
// User-facing errors from sv241-core. Consumers never see raw reqwest or
// serde failures; the `From<sv241_api::Error>` impl folds transport-layer
// errors into the transport branch of the taxonomy. Log-stream drops are
// not errors at all: they become marker lines in the live log.

use thiserror::Error;

use crate::connection::ConnectionState;
use crate::edit_buffer::ConfigSection;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Transport errors ─────────────────────────────────────────────
    #[error("Cannot reach proxy at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Proxy request timed out")]
    Timeout,

    #[error("Proxy error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if the proxy answered at all).
        status: Option<u16>,
    },

    // ── Validation errors ────────────────────────────────────────────
    #[error("Invalid {field} in {section}: {reason}")]
    Validation {
        section: ConfigSection,
        field: String,
        reason: String,
    },

    #[error("Unknown configuration field: {0}")]
    UnknownField(String),

    #[error("{section} cannot be saved before the configuration has been loaded")]
    NotLoaded { section: ConfigSection },

    // ── State errors ─────────────────────────────────────────────────
    #[error("Device is not connected (proxy reports: {state})")]
    DeviceNotConnected { state: ConnectionState },

    // ── Command errors ───────────────────────────────────────────────
    #[error("{command} failed: {message}")]
    CommandFailed { command: String, message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures of the proxy round trip itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout | Self::Api { .. }
        )
    }

    /// Re-label any failure as a user-visible command failure.
    pub(crate) fn into_command_failure(self, command: impl Into<String>) -> Self {
        match self {
            already @ Self::CommandFailed { .. } => already,
            other => Self::CommandFailed {
                command: command.into(),
                message: other.to_string(),
            },
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sv241_api::Error> for CoreError {
    fn from(err: sv241_api::Error) -> Self {
        match err {
            sv241_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            sv241_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            sv241_api::Error::Http { status, body } => CoreError::Api {
                message: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
                status: Some(status),
            },
            sv241_api::Error::Alpaca { code, message } => CoreError::Api {
                message: format!("{message} (Alpaca error {code})"),
                status: None,
            },
            sv241_api::Error::InvalidRequest(message) => CoreError::Config { message },
            sv241_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            sv241_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            sv241_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected response: {message}"),
                status: None,
            },
        }
    }
}
