// ── Live log stream ──
//
// Turns the proxy's log WebSocket into a bounded, classified line buffer.
// Connection drops are not errors here: they show up as marker lines and
// the transport loop reconnects on its own.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sv241_api::websocket::{LogStreamEvent, LogStreamHandle};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DEFAULT_LOG_CAPACITY;

const CONNECTED_MARKER: &str = "--- Connected to live log stream ---";
const DISCONNECTED_MARKER: &str = "--- Disconnected from live log stream. Retrying... ---";

const LINE_CHANNEL_SIZE: usize = 256;

// ── LogLine ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warn,
    Info,
    Debug,
}

impl Severity {
    /// Substring match in priority order. Lines without a level tag are `Info`.
    pub fn classify(text: &str) -> Self {
        if text.contains("ERROR") {
            Self::Error
        } else if text.contains("WARN") {
            Self::Warn
        } else if text.contains("DEBUG") {
            Self::Debug
        } else {
            Self::Info
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLineKind {
    Message,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub received_at: DateTime<Utc>,
    pub severity: Severity,
    pub kind: LogLineKind,
    pub message: String,
}

impl LogLine {
    pub fn message(text: impl Into<String>) -> Self {
        let message = text.into();
        Self {
            received_at: Utc::now(),
            severity: Severity::classify(&message),
            kind: LogLineKind::Message,
            message,
        }
    }

    pub fn connected() -> Self {
        Self::marker(LogLineKind::Connected, Severity::Info, CONNECTED_MARKER)
    }

    pub fn disconnected() -> Self {
        Self::marker(LogLineKind::Disconnected, Severity::Warn, DISCONNECTED_MARKER)
    }

    fn marker(kind: LogLineKind, severity: Severity, text: &str) -> Self {
        Self {
            received_at: Utc::now(),
            severity,
            kind,
            message: text.to_owned(),
        }
    }

    pub fn is_marker(&self) -> bool {
        self.kind != LogLineKind::Message
    }
}

impl From<LogStreamEvent> for LogLine {
    fn from(event: LogStreamEvent) -> Self {
        match event {
            LogStreamEvent::Connected => Self::connected(),
            LogStreamEvent::Line(text) => Self::message(text),
            LogStreamEvent::Disconnected { .. } => Self::disconnected(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ── LogBuffer ────────────────────────────────────────────────────

/// Fixed-capacity FIFO of log lines. The oldest line goes first.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<Arc<LogLine>>,
    capacity: usize,
}

impl LogBuffer {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, returning the evicted one if the buffer was full.
    pub fn push(&mut self, line: Arc<LogLine>) -> Option<Arc<LogLine>> {
        let evicted = if self.lines.len() == self.capacity {
            self.lines.pop_front()
        } else {
            None
        };
        self.lines.push_back(line);
        evicted
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LogLine>> {
        self.lines.iter()
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<LogLine>>> {
        Arc::new(self.lines.iter().cloned().collect())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

// ── AutoScroll ───────────────────────────────────────────────────

/// Follow-the-bottom state of a scrolling log view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoScroll {
    following: bool,
}

impl AutoScroll {
    /// Distance from the bottom, in pixels, that still counts as "at the bottom".
    pub const THRESHOLD_PX: f64 = 50.0;

    pub const fn new() -> Self {
        Self { following: true }
    }

    /// Update from a scroll event and return whether the view follows new lines.
    pub fn on_scroll(&mut self, scroll_top: f64, scroll_height: f64, client_height: f64) -> bool {
        let distance = scroll_height - scroll_top - client_height;
        self.following = distance <= Self::THRESHOLD_PX;
        self.following
    }

    pub const fn is_following(self) -> bool {
        self.following
    }
}

impl Default for AutoScroll {
    fn default() -> Self {
        Self::new()
    }
}

// ── LiveLogStream ────────────────────────────────────────────────

/// Shared view of the live log. Cloning shares the same buffer.
#[derive(Clone)]
pub struct LiveLogStream {
    buffer: watch::Sender<LogBuffer>,
    line_tx: broadcast::Sender<Arc<LogLine>>,
}

impl LiveLogStream {
    pub fn new(capacity: usize) -> Self {
        let (buffer, _) = watch::channel(LogBuffer::new(capacity));
        let (line_tx, _) = broadcast::channel(LINE_CHANNEL_SIZE);
        Self { buffer, line_tx }
    }

    /// Append one line and notify observers.
    pub fn push(&self, line: LogLine) {
        let line = Arc::new(line);
        self.buffer.send_modify(|buffer| {
            buffer.push(Arc::clone(&line));
        });
        let _ = self.line_tx.send(line);
    }

    pub fn apply(&self, event: LogStreamEvent) {
        self.push(LogLine::from(event));
    }

    /// Bridge a transport handle into this buffer until `cancel` fires or the
    /// transport loop ends.
    pub fn start(&self, handle: LogStreamHandle, cancel: CancellationToken) -> JoinHandle<()> {
        let stream = self.clone();
        let mut rx = handle.into_receiver();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = rx.recv() => match result {
                        Ok(event) => stream.apply(event),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "log bridge lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            debug!("log bridge exiting");
        })
    }

    /// Current lines, oldest first.
    pub fn lines(&self) -> Arc<Vec<Arc<LogLine>>> {
        self.buffer.borrow().snapshot()
    }

    pub fn len(&self) -> usize {
        self.buffer.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.borrow().is_empty()
    }

    /// Watch the whole buffer. Wakes once per appended line.
    pub fn watch(&self) -> watch::Receiver<LogBuffer> {
        self.buffer.subscribe()
    }

    /// Lines appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LogLine>> {
        self.line_tx.subscribe()
    }

    pub fn clear(&self) {
        self.buffer.send_modify(LogBuffer::clear);
    }
}

impl Default for LiveLogStream {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

// ── Tests ────────────────────────────────────────────────────────
