// ── Dashboard session ──
//
// Owns one proxy connection and wires the pieces together: the scheduler
// feeds the connection state machine and the read models, the edit buffer
// sits behind a mutex that is never held across a request, and the live
// log bridges the WebSocket transport into a bounded buffer.
//
// Read models are `watch` channels. Every action goes straight to the proxy
// and refreshes whatever it may have changed.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sv241_api::models::{
    DeviceCommand, HeaterMode, HistoryQuery, LiveStatus, PowerStatus, ProxyConfig, RemoteConfig,
    SettingsResponse,
};
use sv241_api::websocket::{LOG_STREAM_PATH, LogStreamHandle, ReconnectConfig};
use sv241_api::{ProxyClient, TransportConfig};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{MASTER_POWER_REFRESH_DELAY, SWITCH_REFRESH_DELAY, SessionConfig};
use crate::connection::{ConnectionSnapshot, ConnectionState, ConnectionStateMachine};
use crate::edit_buffer::{
    self, ConfigEditBuffer, ConfigField, ConfigSection, FieldValue, SaveOutcome,
};
use crate::error::CoreError;
use crate::heater::{HeaterSlot, HeaterSolution};
use crate::log_stream::{LiveLogStream, LogLine};
use crate::model::{TelemetrySample, telemetry_series};
use crate::scheduler::{PollTarget, PollingScheduler};

// ── DashboardSession ─────────────────────────────────────────────

/// The session consumers drive.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Nothing runs in the
/// background until [`start()`](Self::start); one-shot consumers can call
/// [`reload()`](Self::reload) and the actions directly.
#[derive(Clone)]
pub struct DashboardSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    client: ProxyClient,
    connection: ConnectionStateMachine,
    buffer: Mutex<ConfigEditBuffer>,
    settings: watch::Sender<Option<Arc<SettingsResponse>>>,
    remote_config: watch::Sender<Option<Arc<RemoteConfig>>>,
    live_status: watch::Sender<Option<Arc<LiveStatus>>>,
    power_status: watch::Sender<Option<Arc<PowerStatus>>>,
    firmware_version: watch::Sender<Option<String>>,
    proxy_version: watch::Sender<Option<String>>,
    telemetry: watch::Sender<Arc<Vec<TelemetrySample>>>,
    available_dates: watch::Sender<Arc<Vec<String>>>,
    history_query: watch::Sender<HistoryQuery>,
    dirty: watch::Sender<BTreeSet<ConfigSection>>,
    heater_options: watch::Sender<HeaterSolution>,
    log: LiveLogStream,
    cancel: CancellationToken,
    /// Child token for the current run. Replaced on every `start()` so the
    /// session can be stopped and started again.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl DashboardSession {
    /// Build a session with its own HTTP client. Does not contact the proxy.
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let mut transport = TransportConfig::default();
        if let Some(timeout) = config.timeout {
            transport = transport.with_timeout(timeout);
        }
        let client = ProxyClient::new(config.proxy_url.clone(), &transport)?;
        Ok(Self::with_client(config, client))
    }

    /// Build a session around an existing client.
    pub fn with_client(config: SessionConfig, client: ProxyClient) -> Self {
        let log = LiveLogStream::new(config.log_capacity);
        let history_query = config.default_history.clone();
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(SessionInner {
                client,
                connection: ConnectionStateMachine::new(),
                buffer: Mutex::new(ConfigEditBuffer::new()),
                settings: watch::channel(None).0,
                remote_config: watch::channel(None).0,
                live_status: watch::channel(None).0,
                power_status: watch::channel(None).0,
                firmware_version: watch::channel(None).0,
                proxy_version: watch::channel(None).0,
                telemetry: watch::channel(Arc::new(Vec::new())).0,
                available_dates: watch::channel(Arc::new(Vec::new())).0,
                history_query: watch::channel(history_query).0,
                dirty: watch::channel(BTreeSet::new()).0,
                heater_options: watch::channel(HeaterSolution::default()).0,
                log,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                config,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &ProxyClient {
        &self.inner.client
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start the pollers and the live log. Calling it again while running
    /// does nothing.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("session already started");
            return Ok(());
        }

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let config = &self.inner.config;
        let mut handles = Vec::new();

        if config.polling_enabled {
            let scheduler = PollingScheduler::from_config(config);
            handles.extend(scheduler.spawn(self, &child, &self.inner.cancel));
        }

        if config.log_stream_enabled {
            let ws_url = match self.inner.client.ws_url(LOG_STREAM_PATH) {
                Ok(url) => url,
                Err(e) => {
                    child.cancel();
                    for handle in handles {
                        let _ = handle.await;
                    }
                    self.inner.started.store(false, Ordering::SeqCst);
                    return Err(e.into());
                }
            };
            let reconnect = ReconnectConfig {
                delay: config.log_reconnect_delay,
            };
            let transport = LogStreamHandle::spawn(ws_url, reconnect, child.child_token());
            handles.push(self.inner.log.start(transport, child.clone()));
        }

        self.inner.task_handles.lock().await.extend(handles);
        info!(proxy = %config.proxy_url, "session started");
        Ok(())
    }

    /// Cancel every background task and wait for them to finish. Poll
    /// ticks already in flight run to completion.
    pub async fn stop(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.started.store(false, Ordering::SeqCst);
        info!("session stopped");
    }

    /// Stop for good, aborting poll ticks still in flight. Later `start()`
    /// calls still run, but every task they spawn is cancelled immediately.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.stop().await;
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Fetch everything once: settings and connection state, then (when
    /// connected) the device configuration and readings, then history and
    /// the proxy version.
    pub async fn reload(&self) -> ConnectionState {
        let state = self.poll_settings().await;
        if state.allows_device_io() {
            self.refresh_remote_config().await;
            self.poll_device().await;
        }
        tokio::join!(self.poll_history(), self.refresh_proxy_version());
        state
    }

    // ── Read models ──────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.inner.connection.current()
    }

    pub fn settings(&self) -> watch::Receiver<Option<Arc<SettingsResponse>>> {
        self.inner.settings.subscribe()
    }

    pub fn remote_config(&self) -> watch::Receiver<Option<Arc<RemoteConfig>>> {
        self.inner.remote_config.subscribe()
    }

    pub fn live_status(&self) -> watch::Receiver<Option<Arc<LiveStatus>>> {
        self.inner.live_status.subscribe()
    }

    pub fn power_status(&self) -> watch::Receiver<Option<Arc<PowerStatus>>> {
        self.inner.power_status.subscribe()
    }

    pub fn firmware_version(&self) -> watch::Receiver<Option<String>> {
        self.inner.firmware_version.subscribe()
    }

    pub fn proxy_version(&self) -> watch::Receiver<Option<String>> {
        self.inner.proxy_version.subscribe()
    }

    pub fn telemetry_series(&self) -> watch::Receiver<Arc<Vec<TelemetrySample>>> {
        self.inner.telemetry.subscribe()
    }

    pub fn available_dates(&self) -> watch::Receiver<Arc<Vec<String>>> {
        self.inner.available_dates.subscribe()
    }

    pub fn history_query(&self) -> watch::Receiver<HistoryQuery> {
        self.inner.history_query.subscribe()
    }

    pub fn dirty_sections(&self) -> watch::Receiver<BTreeSet<ConfigSection>> {
        self.inner.dirty.subscribe()
    }

    pub fn allowed_heater_options(&self) -> watch::Receiver<HeaterSolution> {
        self.inner.heater_options.subscribe()
    }

    pub fn log(&self) -> &LiveLogStream {
        &self.inner.log
    }

    pub fn log_lines(&self) -> Arc<Vec<Arc<LogLine>>> {
        self.inner.log.lines()
    }

    /// Proxy port text for headers ("COM3", "Connecting to COM3...", ...).
    pub fn port_label(&self) -> String {
        let settings = self.inner.settings.borrow();
        let proxy = settings.as_ref().and_then(|s| s.proxy_config.as_ref());
        self.current_state().port_label(proxy)
    }

    /// Device configuration with pending edits applied.
    pub async fn draft_device(&self) -> Option<RemoteConfig> {
        self.inner.buffer.lock().await.draft_device()
    }

    /// Proxy configuration with pending edits applied.
    pub async fn draft_proxy(&self) -> Option<ProxyConfig> {
        self.inner.buffer.lock().await.draft_proxy()
    }

    // ── Editing ──────────────────────────────────────────────────

    pub async fn edit(
        &self,
        field: ConfigField,
        value: impl Into<FieldValue>,
    ) -> Result<(), CoreError> {
        let mut buffer = self.inner.buffer.lock().await;
        let result = buffer.edit(field, value);
        self.publish_edit_state(&buffer);
        result
    }

    pub async fn edit_heater_mode(&self, slot: HeaterSlot, mode: HeaterMode) -> HeaterSolution {
        let mut buffer = self.inner.buffer.lock().await;
        let solution = buffer.edit_heater_mode(slot, mode);
        self.publish_edit_state(&buffer);
        solution
    }

    /// Drop the pending edits of one section.
    pub async fn discard(&self, section: ConfigSection) -> usize {
        let mut buffer = self.inner.buffer.lock().await;
        let dropped = buffer.discard(section);
        self.publish_edit_state(&buffer);
        dropped
    }

    /// Persist one section and publish the refreshed documents. See
    /// [`edit_buffer::save_section`] for the fallback rules.
    pub async fn save_section(&self, section: ConfigSection) -> Result<SaveOutcome, CoreError> {
        let state = self.current_state();
        let result =
            edit_buffer::save_section(&self.inner.buffer, &self.inner.client, state, section).await;

        if let Ok(outcome) = &result {
            if let Some(config) = &outcome.device_config {
                self.inner
                    .remote_config
                    .send_replace(Some(Arc::new(config.clone())));
            }
            if let Some(settings) = &outcome.settings {
                self.inner
                    .settings
                    .send_replace(Some(Arc::new(settings.clone())));
            }
        }

        let buffer = self.inner.buffer.lock().await;
        self.publish_edit_state(&buffer);
        result
    }

    fn publish_edit_state(&self, buffer: &ConfigEditBuffer) {
        let dirty = buffer.dirty_sections();
        self.inner.dirty.send_if_modified(|current| {
            if *current == dirty {
                return false;
            }
            *current = dirty;
            true
        });

        let solution = buffer.heater_solution();
        self.inner.heater_options.send_if_modified(|current| {
            if *current == solution {
                return false;
            }
            *current = solution;
            true
        });
    }

    // ── Power ────────────────────────────────────────────────────

    /// Switch one output (Alpaca switch id) on or off.
    pub async fn set_switch(&self, id: u32, state: bool) -> Result<(), CoreError> {
        info!(id, state, "setting switch");
        self.inner.client.set_switch(id, state).await?;
        self.refresh_power_after(SWITCH_REFRESH_DELAY).await;
        Ok(())
    }

    /// Set a value-type output (e.g. the adjustable converter voltage).
    pub async fn set_switch_value(&self, id: u32, value: f64) -> Result<(), CoreError> {
        info!(id, value, "setting switch value");
        self.inner.client.set_switch_value(id, value).await?;
        self.refresh_power_after(SWITCH_REFRESH_DELAY).await;
        Ok(())
    }

    /// Master power for every output.
    pub async fn set_all_power(&self, state: bool) -> Result<(), CoreError> {
        info!(state, "setting master power");
        self.inner.client.set_all_power(state).await?;
        self.refresh_power_after(MASTER_POWER_REFRESH_DELAY).await;
        Ok(())
    }

    async fn refresh_power_after(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
        self.refresh_power().await;
    }

    async fn refresh_power(&self) {
        match self.inner.client.get_power_status().await {
            Ok(power) => {
                self.inner.power_status.send_replace(Some(Arc::new(power)));
            }
            Err(e) => log_poll_failure("power status", &e),
        }
    }

    // ── Commands & backups ───────────────────────────────────────

    /// Send a device command. The proxy does not wait for the device, so
    /// success only means the command was handed over.
    pub async fn send_command(&self, command: DeviceCommand) -> Result<String, CoreError> {
        info!(%command, "sending device command");
        self.inner
            .client
            .send_command(command)
            .await
            .map_err(|e| CoreError::from(e).into_command_failure(command.to_string()))
    }

    /// Full backup document (proxy settings plus firmware config) as JSON.
    pub async fn create_backup(&self) -> Result<String, CoreError> {
        Ok(self.inner.client.create_backup().await?)
    }

    /// Restore a backup, then re-fetch everything it may have changed.
    /// The document is checked locally first; an incomplete one is never sent.
    pub async fn restore_backup(&self, content: &str) -> Result<String, CoreError> {
        info!("restoring backup");
        let message = self
            .inner
            .client
            .restore_backup(content)
            .await
            .map_err(|e| CoreError::from(e).into_command_failure("backup restore"))?;

        self.inner.buffer.lock().await.discard_all();
        self.reload().await;
        Ok(message)
    }

    // ── Telemetry ────────────────────────────────────────────────

    /// Show one logged night, or go back to the rolling default window.
    pub async fn select_history_date(&self, date: Option<String>) {
        let query = date.map_or_else(
            || self.inner.config.default_history.clone(),
            HistoryQuery::Date,
        );
        info!(%query, "history selection changed");
        self.inner.history_query.send_replace(query);
        self.poll_history().await;
    }

    pub fn telemetry_download_url(&self, date: &str) -> Url {
        self.inner.client.telemetry_download_url(date)
    }

    /// One night of telemetry as CSV.
    pub async fn download_telemetry(&self, date: &str) -> Result<String, CoreError> {
        Ok(self.inner.client.download_telemetry(date).await?)
    }

    // ── Fetch helpers ────────────────────────────────────────────

    async fn refresh_remote_config(&self) {
        match self.inner.client.get_config().await {
            Ok(config) if config.is_empty() => debug!("device config not cached by the proxy yet"),
            Ok(config) => self.apply_remote_config(config).await,
            Err(e) => log_poll_failure("device config", &e),
        }
    }

    async fn apply_remote_config(&self, config: RemoteConfig) {
        let mut buffer = self.inner.buffer.lock().await;
        buffer.set_remote_device(config.clone());
        self.publish_edit_state(&buffer);
        drop(buffer);
        self.inner.remote_config.send_replace(Some(Arc::new(config)));
    }

    async fn refresh_proxy_version(&self) {
        match self.inner.client.get_proxy_version().await {
            Ok(version) => {
                self.inner.proxy_version.send_replace(Some(version));
            }
            Err(e) => log_poll_failure("proxy version", &e),
        }
    }
}

// ── Polling ──────────────────────────────────────────────────────

impl PollTarget for DashboardSession {
    async fn poll_settings(&self) -> ConnectionState {
        let result = self.inner.client.get_settings().await;
        let state = self
            .inner
            .connection
            .apply(ConnectionSnapshot::from_poll(&result));

        match result {
            Ok(settings) => {
                if let Some(proxy) = &settings.proxy_config {
                    let mut buffer = self.inner.buffer.lock().await;
                    buffer.set_remote_proxy(proxy.clone());
                    self.publish_edit_state(&buffer);
                }
                self.inner.settings.send_replace(Some(Arc::new(settings)));
            }
            Err(e) => warn!(error = %e, "settings poll failed"),
        }
        state
    }

    async fn poll_device(&self) {
        let config_missing = self.inner.buffer.lock().await.remote_device().is_none();
        let client = &self.inner.client;

        let (firmware, status, power, ()) = tokio::join!(
            client.get_firmware_version(),
            client.get_live_status(),
            client.get_power_status(),
            async {
                if config_missing {
                    self.refresh_remote_config().await;
                }
            },
        );

        match firmware {
            Ok(version) => {
                self.inner.firmware_version.send_replace(Some(version));
            }
            Err(e) => log_poll_failure("firmware version", &e),
        }
        match status {
            Ok(status) => {
                self.inner.live_status.send_replace(Some(Arc::new(status)));
            }
            Err(e) => log_poll_failure("live status", &e),
        }
        match power {
            Ok(power) => {
                self.inner.power_status.send_replace(Some(Arc::new(power)));
            }
            Err(e) => log_poll_failure("power status", &e),
        }
    }

    async fn poll_history(&self) {
        let query = self.inner.history_query.borrow().clone();
        let client = &self.inner.client;
        let (history, dates) = tokio::join!(
            client.get_telemetry_history(&query),
            client.get_telemetry_dates(),
        );

        match history {
            Ok(points) => {
                let series = telemetry_series(points);
                debug!(%query, points = series.len(), "telemetry history refreshed");
                self.inner.telemetry.send_replace(Arc::new(series));
            }
            Err(e) => log_poll_failure("telemetry history", &e),
        }
        match dates {
            Ok(dates) => {
                self.inner.available_dates.send_replace(Arc::new(dates));
            }
            Err(e) => log_poll_failure("telemetry dates", &e),
        }
    }
}

/// The proxy answers 503 until its caches fill after a (re)connect; that
/// is expected and only worth a debug line.
fn log_poll_failure(what: &str, error: &sv241_api::Error) {
    if error.is_transient() {
        debug!(error = %error, "{what} not available yet");
    } else {
        warn!(error = %error, "{what} poll failed");
    }
}
