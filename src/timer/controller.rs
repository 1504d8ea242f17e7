use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::task::TaskTracker;

use crate::{
    display::format_time, presence::PresenceSample, settings::Settings, stats::StatsBackend,
};

use super::{FinalizedDuration, TimerEffect, TimerState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

const FINALIZED_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub formatted: String,
}

/// Owns the presence timer and the two clocks that drive it.
///
/// Every mutation goes through a `TimerState` method while `state` is locked,
/// and the resulting effects are applied before the lock is released, so the
/// ticker, the grace delay and the frame loop never interleave mid-transition.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    backend: Arc<dyn StatsBackend>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    grace: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    grace_period: Duration,
    finalized_tx: broadcast::Sender<FinalizedDuration>,
    writes: TaskTracker,
}

impl TimerController {
    pub fn new(settings: &Settings, backend: Arc<dyn StatsBackend>) -> Self {
        Self::with_intervals(backend, settings.tick_interval(), settings.grace_period())
    }

    pub fn with_intervals(
        backend: Arc<dyn StatsBackend>,
        tick_interval: Duration,
        grace_period: Duration,
    ) -> Self {
        let (finalized_tx, _) = broadcast::channel(FINALIZED_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            backend,
            ticker: Arc::new(Mutex::new(None)),
            grace: Arc::new(Mutex::new(None)),
            tick_interval,
            grace_period,
            finalized_tx,
            writes: TaskTracker::new(),
        }
    }

    /// Receives every episode as it is finalized.
    pub fn subscribe(&self) -> broadcast::Receiver<FinalizedDuration> {
        self.finalized_tx.subscribe()
    }

    pub async fn get_state(&self) -> TimerState {
        self.state.lock().await.clone()
    }

    pub async fn get_snapshot(&self) -> TimerSnapshot {
        let state = self.get_state().await;
        TimerSnapshot {
            formatted: format_time(state.elapsed_seconds),
            state,
        }
    }

    pub async fn observe(&self, sample: &PresenceSample) {
        let mut guard = self.state.lock().await;
        let before = guard.status;
        let effects = guard.observe(sample);
        if guard.status != before {
            log_debug!(
                "presence {:?} -> {:?} at {}s",
                before,
                guard.status,
                guard.elapsed_seconds
            );
        }
        self.apply_effects(effects).await;
    }

    /// Drops any episode in progress and silences both clocks.
    pub async fn reset(&self) {
        let mut guard = self.state.lock().await;
        let effects = guard.reset();
        self.apply_effects(effects).await;
    }

    async fn apply_effects(&self, effects: Vec<TimerEffect>) {
        for effect in effects {
            match effect {
                TimerEffect::StartTicking => self.spawn_ticker().await,
                TimerEffect::StopTicking => self.cancel_ticker().await,
                TimerEffect::ArmGrace { epoch } => self.arm_grace(epoch).await,
                TimerEffect::DisarmGrace => self.disarm_grace().await,
                TimerEffect::Finalize(finalized) => self.report(finalized),
            }
        }
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            // First tick lands one full interval after presence starts.
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            loop {
                interval.tick().await;
                if !state.lock().await.tick() {
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn arm_grace(&self, epoch: u64) {
        let mut grace_guard = self.grace.lock().await;
        if let Some(handle) = grace_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let grace_period = self.grace_period;

        let handle = tokio::spawn(async move {
            time::sleep(grace_period).await;

            // Handled inline: `apply_effects` would make this future recursive.
            let effects = controller.state.lock().await.grace_elapsed(epoch);
            for effect in effects {
                if let TimerEffect::Finalize(finalized) = effect {
                    log_info!(
                        "hands gone for {}s, finalizing {}s episode",
                        grace_period.as_secs(),
                        finalized.seconds
                    );
                    controller.report(finalized);
                }
            }
        });

        *grace_guard = Some(handle);
    }

    async fn disarm_grace(&self) {
        if let Some(handle) = self.grace.lock().await.take() {
            handle.abort();
        }
    }

    /// Waits for backend writes already in flight. Used before exiting so a
    /// finalized episode is not lost with the process.
    pub async fn flush_reports(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    /// Fire-and-forget: the write runs on its own task and its outcome is
    /// only logged. The local counter has already been reset.
    fn report(&self, finalized: FinalizedDuration) {
        let _ = self.finalized_tx.send(finalized);

        let backend = self.backend.clone();
        self.writes.spawn(async move {
            match backend.record_duration(finalized.seconds).await {
                Ok(()) => log_info!("Timer value sent to the backend: {}", finalized.seconds),
                Err(err) => log_error!(
                    "Error sending timer value {} to backend: {err:#}",
                    finalized.seconds
                ),
            }
        });
    }
}
