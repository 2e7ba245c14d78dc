// ── Runtime session configuration ──
//
// Describes which proxy to supervise and how often to poll it. Never touches
// disk: the CLI builds a `SessionConfig` from its profile and hands it in.

use std::time::Duration;

use sv241_api::models::HistoryQuery;
use url::Url;

/// Settings/firmware/status/power cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Telemetry history cadence.
pub const DEFAULT_HISTORY_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Pause before the log stream reconnects.
pub const DEFAULT_LOG_RECONNECT_DELAY: Duration = Duration::from_secs(3);
/// Lines kept in the live log.
pub const DEFAULT_LOG_CAPACITY: usize = 500;
/// Delay before power state is re-read after switching one output.
pub const SWITCH_REFRESH_DELAY: Duration = Duration::from_millis(200);
/// Delay before power state is re-read after the master switch.
pub const MASTER_POWER_REFRESH_DELAY: Duration = Duration::from_millis(500);

/// Configuration for supervising one proxy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Proxy root URL (e.g. `http://192.168.1.20:8080`).
    pub proxy_url: Url,
    /// Per-request timeout. `None` keeps the transport default (unbounded).
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub history_interval: Duration,
    pub log_reconnect_delay: Duration,
    pub log_capacity: usize,
    /// History shown until the user picks a specific night.
    pub default_history: HistoryQuery,
    /// Whether `start()` opens the live log stream.
    pub log_stream_enabled: bool,
    /// Whether `start()` runs the background pollers.
    pub polling_enabled: bool,
}

impl SessionConfig {
    /// Defaults for everything except the proxy address.
    pub fn new(proxy_url: Url) -> Self {
        Self {
            proxy_url,
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_interval: DEFAULT_HISTORY_INTERVAL,
            log_reconnect_delay: DEFAULT_LOG_RECONNECT_DELAY,
            log_capacity: DEFAULT_LOG_CAPACITY,
            default_history: HistoryQuery::default(),
            log_stream_enabled: true,
            polling_enabled: true,
        }
    }
}
