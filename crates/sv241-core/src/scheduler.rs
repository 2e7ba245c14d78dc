// ── Tiered polling ──
//
// Two independent cadences. The fast tick always polls the proxy settings,
// publishes the derived connection state, and only then, when the device is
// connected, fans out to the device-bound fetches. The history tick ignores
// connection state entirely.
//
// Every tick runs as its own task, so a slow proxy makes ticks overlap
// rather than queue up. Last write wins.

use std::future::Future;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::connection::ConnectionState;

/// What the scheduler drives. Implementations log their own failures; a
/// failed poll never stops the schedule.
pub trait PollTarget: Clone + Send + Sync + 'static {
    /// Poll the proxy settings and publish the resulting connection state.
    fn poll_settings(&self) -> impl Future<Output = ConnectionState> + Send;

    /// Device-bound fetches. Only called while connected.
    fn poll_device(&self) -> impl Future<Output = ()> + Send;

    /// Selected telemetry history and the list of logged nights.
    fn poll_history(&self) -> impl Future<Output = ()> + Send;
}

/// One fast tick: settings first, then the gated device fetches.
pub async fn run_fast_tick<T: PollTarget>(target: &T) -> ConnectionState {
    let state = target.poll_settings().await;
    if state.allows_device_io() {
        target.poll_device().await;
    } else {
        debug!(%state, "skipping device polls");
    }
    state
}

#[derive(Debug, Clone, Copy)]
pub struct PollingScheduler {
    poll_interval: Duration,
    history_interval: Duration,
}

impl PollingScheduler {
    pub fn new(poll_interval: Duration, history_interval: Duration) -> Self {
        Self {
            poll_interval,
            history_interval,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.poll_interval, config.history_interval)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn history_interval(&self) -> Duration {
        self.history_interval
    }

    /// Spawn both tick loops. The first tick of each fires immediately.
    ///
    /// Both loops stop ticking when `cancel` fires and then wait for the
    /// ticks still in flight. Those are aborted only once `shutdown` fires.
    pub fn spawn<T: PollTarget>(
        &self,
        target: &T,
        cancel: &CancellationToken,
        shutdown: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let tokens = LoopTokens {
            cancel: cancel.clone(),
            shutdown: shutdown.clone(),
        };
        let fast = {
            let target = target.clone();
            tick_loop(self.poll_interval, tokens.clone(), "fast", move || {
                let target = target.clone();
                async move {
                    run_fast_tick(&target).await;
                }
            })
        };
        let history = {
            let target = target.clone();
            tick_loop(self.history_interval, tokens, "history", move || {
                let target = target.clone();
                async move { target.poll_history().await }
            })
        };
        vec![fast, history]
    }
}

#[derive(Debug, Clone)]
struct LoopTokens {
    cancel: CancellationToken,
    shutdown: CancellationToken,
}

fn tick_loop<F, Fut>(
    period: Duration,
    tokens: LoopTokens,
    name: &'static str,
    make_tick: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                () = tokens.cancel.cancelled() => break,
                _ = interval.tick() => {
                    while let Some(result) = in_flight.try_join_next() {
                        log_tick_result(name, &result);
                    }
                    debug!(tick = name, overlapping = in_flight.len(), "tick");
                    in_flight.spawn(make_tick());
                }
            }
        }

        let aborted = loop {
            tokio::select! {
                biased;
                () = tokens.shutdown.cancelled() => break true,
                result = in_flight.join_next() => match result {
                    Some(result) => log_tick_result(name, &result),
                    None => break false,
                },
            }
        };
        if aborted {
            debug!(tick = name, remaining = in_flight.len(), "aborting ticks in flight");
            in_flight.shutdown().await;
        }
        debug!(tick = name, "tick loop exiting");
    })
}

fn log_tick_result(name: &'static str, result: &Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!(tick = name, "tick cancelled"),
        Err(e) => warn!(tick = name, error = %e, "tick task failed"),
    }
}

// ── Tests ────────────────────────────────────────────────────────
