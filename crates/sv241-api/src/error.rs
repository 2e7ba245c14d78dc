use thiserror::Error;

/// Top-level error type for the `sv241-api` crate.
///
/// Covers every failure mode of talking to the proxy: transport, HTTP
/// status, payload decoding, and the live log WebSocket.
/// `sv241-core` maps these into its user-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Proxy ───────────────────────────────────────────────────────
    /// The proxy answered with a non-success status. `body` is the
    /// plain-text message the proxy wrote (it uses `http.Error`).
    #[error("Proxy returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The Alpaca switch endpoints answer `200 OK` and report failure in the
    /// body (`ErrorNumber` / `ErrorMessage`).
    #[error("Alpaca error {code}: {message}")]
    Alpaca { code: i64, message: String },

    /// Request rejected locally before anything was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status == 503 || *status == 504,
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the request timed out in the transport.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status code, when the proxy answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
