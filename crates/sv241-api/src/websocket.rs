//! Live log stream with auto-reconnect.
//!
//! Subscribes to the proxy's `/ws/logs` endpoint and forwards every text
//! frame through a [`tokio::sync::broadcast`] channel. When the socket closes
//! (cleanly, abnormally, or because the connect itself failed) a
//! [`LogStreamEvent::Disconnected`] is published and the loop reconnects after
//! a fixed delay. There is no retry ceiling; only cancellation ends it.
//!
//! # Example
//!
//! ```rust,ignore
//! use sv241_api::websocket::{LogStreamHandle, LogStreamEvent, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = Url::parse("ws://192.168.1.20:8080/ws/logs")?;
//!
//! let handle = LogStreamHandle::spawn(ws_url, ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.into_receiver();
//!
//! while let Ok(event) = rx.recv().await {
//!     if let LogStreamEvent::Line(line) = event {
//!         println!("{line}");
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Path of the log endpoint, relative to the proxy root.
pub const LOG_STREAM_PATH: &str = "ws/logs";

// ── LogStreamEvent ───────────────────────────────────────────────────

/// What the background loop observed on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogStreamEvent {
    /// The socket opened.
    Connected,
    /// One text frame, as sent by the proxy.
    Line(String),
    /// The socket closed or could not be opened. A reconnect follows.
    Disconnected { reason: Option<String> },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Fixed-delay reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Pause between a disconnect and the next attempt. Default: 3s.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
        }
    }
}

// ── LogStreamHandle ──────────────────────────────────────────────────

/// Handle to a running log stream.
///
/// The handle's own receiver sees every event since the loop was spawned,
/// including the first `Connected`; receivers from
/// [`subscribe`](Self::subscribe) only see what happens afterwards.
pub struct LogStreamHandle {
    event_rx: broadcast::Receiver<LogStreamEvent>,
    cancel: CancellationToken,
}

impl LogStreamHandle {
    /// Spawn the connect/read/reconnect loop and return immediately.
    pub fn spawn(ws_url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            log_loop(ws_url, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<LogStreamEvent> {
        self.event_rx.resubscribe()
    }

    /// Take the original receiver, which has buffered everything so far.
    pub fn into_receiver(self) -> broadcast::Receiver<LogStreamEvent> {
        self.event_rx
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → publish disconnect → wait → reconnect.
async fn log_loop(
    ws_url: Url,
    event_tx: broadcast::Sender<LogStreamEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &event_tx, &cancel) => result,
        };

        if cancel.is_cancelled() {
            break;
        }

        let reason = match result {
            Ok(()) => {
                tracing::info!("log stream closed, reconnecting");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "log stream error");
                Some(e.to_string())
            }
        };

        // No receivers just means nobody is watching the log right now.
        let _ = event_tx.send(LogStreamEvent::Disconnected { reason });

        tracing::debug!(
            delay_ms = u64::try_from(reconnect.delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(reconnect.delay) => {}
        }
    }

    tracing::debug!("log stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one WebSocket connection and read text frames until it drops.
async fn connect_and_read(
    url: &Url,
    event_tx: &broadcast::Sender<LogStreamEvent>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to log stream");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("log stream connected");
    let _ = event_tx.send(LogStreamEvent::Connected);

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let _ = event_tx.send(LogStreamEvent::Line(text.as_str().to_owned()));
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("log stream ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return match frame {
                            Some(cf) if cf.code != CloseCode::Normal => {
                                Err(Error::WebSocketClosed {
                                    code: cf.code.into(),
                                    reason: cf.reason.as_str().to_owned(),
                                })
                            }
                            _ => {
                                tracing::info!("log stream close frame received");
                                Ok(())
                            }
                        };
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("log stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
