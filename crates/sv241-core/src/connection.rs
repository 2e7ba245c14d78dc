// ── Connection state machine ──
//
// The dashboard never talks to the device directly; it only learns about
// the serial link through the proxy's settings document. Every settings poll
// builds a fresh snapshot and the state is derived from it alone, so a
// stale value can never leak from one poll into the next.

use serde::Serialize;
use sv241_api::models::{ProxyConfig, SettingsResponse};
use tokio::sync::watch;
use tracing::info;

// ── ConnectionState ──────────────────────────────────────────────

/// Reachability of the device as seen through the proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum ConnectionState {
    /// The proxy itself did not answer.
    #[default]
    #[strum(to_string = "offline")]
    Offline,
    /// No serial port configured or detected yet.
    #[strum(to_string = "auto-detecting")]
    AutoDetecting,
    /// A port is known but the serial link is down.
    #[strum(to_string = "connecting")]
    Connecting,
    #[strum(to_string = "connected")]
    Connected,
    /// Reconnection paused on the proxy (e.g. the port is in use elsewhere).
    #[strum(to_string = "paused")]
    Paused,
}

impl ConnectionState {
    /// Device-bound polls and saves are only issued while connected.
    pub const fn allows_device_io(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Human-readable port text for headers and status lines.
    pub fn port_label(self, proxy: Option<&ProxyConfig>) -> String {
        let port = proxy.and_then(ProxyConfig::port_name);
        match (self, port) {
            (Self::Offline, _) => "Proxy Offline".to_owned(),
            (Self::AutoDetecting, _) | (_, None) => "Auto-detecting...".to_owned(),
            (Self::Connecting, Some(port)) => format!("Connecting to {port}..."),
            (Self::Paused, Some(port)) => format!("{port} (Paused)"),
            (Self::Connected, Some(port)) => port.to_owned(),
        }
    }
}

// ── ConnectionSnapshot ───────────────────────────────────────────

/// Inputs of one evaluation. Rebuilt on every settings poll, never merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub poll_succeeded: bool,
    pub reconnect_paused: bool,
    pub has_port_name: bool,
    pub serial_connected: bool,
}

impl ConnectionSnapshot {
    pub const fn new(
        poll_succeeded: bool,
        reconnect_paused: bool,
        has_port_name: bool,
        serial_connected: bool,
    ) -> Self {
        Self {
            poll_succeeded,
            reconnect_paused,
            has_port_name,
            serial_connected,
        }
    }

    /// Snapshot of a failed settings poll.
    pub const fn offline() -> Self {
        Self::new(false, false, false, false)
    }

    /// Snapshot of a successful settings poll.
    pub fn from_settings(settings: &SettingsResponse) -> Self {
        let has_port_name = settings
            .proxy_config
            .as_ref()
            .and_then(ProxyConfig::port_name)
            .is_some();
        Self::new(
            true,
            settings.reconnect_paused,
            has_port_name,
            settings.serial_port_connected,
        )
    }

    /// Snapshot from the outcome of a settings poll. Any error, transport
    /// or HTTP, counts as the proxy being unreachable.
    pub fn from_poll<E>(result: &Result<SettingsResponse, E>) -> Self {
        match result {
            Ok(settings) => Self::from_settings(settings),
            Err(_) => Self::offline(),
        }
    }

    /// Evaluate the rules in order; the first match wins.
    pub const fn state(&self) -> ConnectionState {
        if !self.poll_succeeded {
            ConnectionState::Offline
        } else if self.reconnect_paused {
            ConnectionState::Paused
        } else if !self.has_port_name {
            ConnectionState::AutoDetecting
        } else if !self.serial_connected {
            ConnectionState::Connecting
        } else {
            ConnectionState::Connected
        }
    }
}

// ── ConnectionStateMachine ───────────────────────────────────────

/// Publishes the derived state to observers.
///
/// Only the settings poll feeds this; failures of any other request never
/// touch it.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: watch::Sender<ConnectionState>,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::default());
        Self { state }
    }

    /// Derive the state from `snapshot`, publish it, and return it.
    /// Observers are only woken when the value actually changes.
    pub fn apply(&self, snapshot: ConnectionSnapshot) -> ConnectionState {
        let next = snapshot.state();
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!(from = %current, to = %next, "connection state changed");
            *current = next;
            true
        });
        next
    }

    pub fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ok: bool, paused: bool, port: bool, serial: bool) -> ConnectionState {
        ConnectionSnapshot::new(ok, paused, port, serial).state()
    }

    #[test]
    fn truth_table() {
        assert_eq!(snap(true, true, true, true), ConnectionState::Paused);
        assert_eq!(snap(true, false, false, false), ConnectionState::AutoDetecting);
        assert_eq!(snap(true, false, false, true), ConnectionState::AutoDetecting);
        assert_eq!(snap(true, false, true, false), ConnectionState::Connecting);
        assert_eq!(snap(true, false, true, true), ConnectionState::Connected);
    }

    #[test]
    fn failed_poll_is_offline_whatever_else_is_set() {
        for bits in 0..8u8 {
            let state = snap(false, bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
            assert_eq!(state, ConnectionState::Offline);
        }
    }

    #[test]
    fn paused_beats_missing_port() {
        assert_eq!(snap(true, true, false, false), ConnectionState::Paused);
    }

    #[test]
    fn from_poll_reads_settings() {
        let settings = SettingsResponse {
            proxy_config: Some(ProxyConfig {
                serial_port_name: "COM3".into(),
                ..ProxyConfig::default()
            }),
            serial_port_connected: true,
            ..SettingsResponse::default()
        };
        let ok: Result<_, ()> = Ok(settings);
        assert_eq!(ConnectionSnapshot::from_poll(&ok).state(), ConnectionState::Connected);

        let failed: Result<SettingsResponse, &str> = Err("refused");
        assert_eq!(
            ConnectionSnapshot::from_poll(&failed).state(),
            ConnectionState::Offline
        );
    }

    #[test]
    fn missing_proxy_config_is_auto_detecting() {
        let ok: Result<_, ()> = Ok(SettingsResponse {
            serial_port_connected: true,
            ..SettingsResponse::default()
        });
        assert_eq!(
            ConnectionSnapshot::from_poll(&ok).state(),
            ConnectionState::AutoDetecting
        );
    }

    #[test]
    fn fail_then_succeed_recovers_without_memory() {
        let machine = ConnectionStateMachine::new();
        assert_eq!(machine.apply(ConnectionSnapshot::offline()), ConnectionState::Offline);
        let next = machine.apply(ConnectionSnapshot::new(true, false, true, false));
        assert_eq!(next, ConnectionState::Connecting);
        assert_eq!(machine.current(), ConnectionState::Connecting);
    }

    #[test]
    fn apply_only_notifies_on_change() {
        let machine = ConnectionStateMachine::new();
        let mut rx = machine.subscribe();
        rx.mark_unchanged();

        machine.apply(ConnectionSnapshot::offline());
        assert!(!rx.has_changed().unwrap_or(true));

        machine.apply(ConnectionSnapshot::new(true, false, true, true));
        assert!(rx.has_changed().unwrap_or(false));
    }

    #[test]
    fn port_labels() {
        let proxy = ProxyConfig {
            serial_port_name: "COM3".into(),
            ..ProxyConfig::default()
        };
        assert_eq!(ConnectionState::Offline.port_label(Some(&proxy)), "Proxy Offline");
        assert_eq!(ConnectionState::AutoDetecting.port_label(None), "Auto-detecting...");
        assert_eq!(
            ConnectionState::Connecting.port_label(Some(&proxy)),
            "Connecting to COM3..."
        );
        assert_eq!(ConnectionState::Paused.port_label(Some(&proxy)), "COM3 (Paused)");
        assert_eq!(ConnectionState::Connected.port_label(Some(&proxy)), "COM3");
        assert_eq!(ConnectionState::Connected.port_label(None), "Auto-detecting...");
    }

    #[test]
    fn only_connected_allows_device_io() {
        assert!(ConnectionState::Connected.allows_device_io());
        assert!(!ConnectionState::Paused.allows_device_io());
        assert!(!ConnectionState::Connecting.allows_device_io());
    }
}
