//! Periodic refresh of every period's leaderboard.
//!
//! Each period moves `Idle -> Running -> Idle`. A tick or manual trigger that
//! lands while the period is `Running` is skipped and recorded, so a period
//! never has two refreshes in flight.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use leaderboard_core::Period;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::RefreshConfig;
use crate::error::AggregationError;
use crate::services::Aggregator;

/// One refresh of one period, run on the blocking pool.
pub trait Refresh: Send + Sync + 'static {
    fn refresh(&self, period: Period) -> Result<i64, AggregationError>;
}

impl Refresh for Aggregator {
    fn refresh(&self, period: Period) -> Result<i64, AggregationError> {
        self.compute(period, Utc::now())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOutcome {
    Started,
    Skipped,
    /// The scheduler is shutting down and accepts no new runs.
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefreshEventKind {
    Started,
    Succeeded { generation_id: i64 },
    Failed { message: String },
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RefreshEvent {
    pub period: Period,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RefreshEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeriodStatus {
    pub period: Period,
    pub state: RefreshState,
    pub cadence_secs: u64,
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub skips: u64,
    pub last_generation_id: Option<i64>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl PeriodStatus {
    fn new(period: Period, cadence: Duration) -> Self {
        Self {
            period,
            state: RefreshState::Idle,
            cadence_secs: cadence.as_secs(),
            runs: 0,
            successes: 0,
            failures: 0,
            skips: 0,
            last_generation_id: None,
            last_success_at: None,
            last_failure_at: None,
            last_error: None,
        }
    }
}

struct Slot {
    status: PeriodStatus,
    in_flight: Option<JoinHandle<()>>,
}

struct Slots {
    closed: bool,
    periods: HashMap<Period, Slot>,
}

struct Shared {
    refresher: Arc<dyn Refresh>,
    config: RefreshConfig,
    slots: Mutex<Slots>,
    events: Mutex<VecDeque<RefreshEvent>>,
}

impl Shared {
    fn record(&self, period: Period, kind: RefreshEventKind) {
        let mut events = lock(&self.events);
        while events.len() >= self.config.event_log_capacity.max(1) {
            events.pop_front();
        }
        events.push_back(RefreshEvent {
            period,
            at: Utc::now(),
            kind,
        });
    }

    fn finish(&self, period: Period, result: Result<i64, String>) {
        let now = Utc::now();
        let kind = {
            let mut slots = lock(&self.slots);
            let Some(slot) = slots.periods.get_mut(&period) else {
                return;
            };
            let status = &mut slot.status;
            status.state = RefreshState::Idle;
            match result {
                Ok(generation_id) => {
                    status.successes += 1;
                    status.last_generation_id = Some(generation_id);
                    status.last_success_at = Some(now);
                    status.last_error = None;
                    RefreshEventKind::Succeeded { generation_id }
                }
                Err(message) => {
                    status.failures += 1;
                    status.last_failure_at = Some(now);
                    status.last_error = Some(message.clone());
                    RefreshEventKind::Failed { message }
                }
            }
        };
        match &kind {
            RefreshEventKind::Failed { message } => {
                warn!(%period, error = %message, "refresh failed, keeping previous generation")
            }
            _ => debug!(%period, "refresh finished"),
        }
        self.record(period, kind);
    }
}

/// Owns the per-period timers and the Idle/Running guard.
///
/// Must be created and triggered from inside a Tokio runtime.
#[derive(Clone)]
pub struct RefreshScheduler {
    shared: Arc<Shared>,
    shutdown: Arc<watch::Sender<bool>>,
    timers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl RefreshScheduler {
    pub fn new(refresher: Arc<dyn Refresh>, config: RefreshConfig) -> Self {
        let periods = Period::ALL
            .into_iter()
            .map(|period| {
                let slot = Slot {
                    status: PeriodStatus::new(period, config.cadence(period)),
                    in_flight: None,
                };
                (period, slot)
            })
            .collect();
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                refresher,
                config,
                slots: Mutex::new(Slots {
                    closed: false,
                    periods,
                }),
                events: Mutex::new(VecDeque::new()),
            }),
            shutdown: Arc::new(shutdown),
            timers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Starts one timer per period. The first tick fires immediately.
    pub fn start(&self) {
        let mut timers = lock(&self.timers);
        if !timers.is_empty() || *self.shutdown.borrow() {
            return;
        }
        for period in Period::ALL {
            let cadence = self.shared.config.cadence(period);
            let scheduler = self.clone();
            let shutdown = self.shutdown.subscribe();
            timers.push(tokio::spawn(run_timer(scheduler, period, cadence, shutdown)));
            info!(%period, cadence_secs = cadence.as_secs(), "refresh timer started");
        }
    }

    /// Runs a refresh for `period` unless one is already running.
    pub fn trigger(&self, period: Period) -> TriggerOutcome {
        let mut slots = lock(&self.shared.slots);
        if slots.closed {
            return TriggerOutcome::Stopped;
        }
        let Some(slot) = slots.periods.get_mut(&period) else {
            return TriggerOutcome::Stopped;
        };
        if slot.status.state == RefreshState::Running {
            slot.status.skips += 1;
            drop(slots);
            info!(%period, "refresh skipped, previous run still in progress");
            self.shared.record(period, RefreshEventKind::Skipped);
            return TriggerOutcome::Skipped;
        }
        slot.status.state = RefreshState::Running;
        slot.status.runs += 1;
        self.shared.record(period, RefreshEventKind::Started);

        let shared = self.shared.clone();
        slot.in_flight = Some(tokio::task::spawn_blocking(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| shared.refresher.refresh(period)));
            let result = match outcome {
                Ok(Ok(generation_id)) => Ok(generation_id),
                Ok(Err(err)) => Err(err.to_string()),
                Err(_) => Err("refresh panicked".to_string()),
            };
            shared.finish(period, result);
        }));
        TriggerOutcome::Started
    }

    pub fn status(&self, period: Period) -> Option<PeriodStatus> {
        lock(&self.shared.slots)
            .periods
            .get(&period)
            .map(|slot| slot.status.clone())
    }

    /// Status of every period in `all`, `month`, `week` order.
    pub fn statuses(&self) -> Vec<PeriodStatus> {
        let slots = lock(&self.shared.slots);
        Period::ALL
            .into_iter()
            .filter_map(|period| slots.periods.get(&period))
            .map(|slot| slot.status.clone())
            .collect()
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<RefreshEvent> {
        lock(&self.shared.events).iter().cloned().collect()
    }

    /// Stops the timers, refuses new runs, and waits for in-flight refreshes
    /// to promote or fail.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let timers: Vec<JoinHandle<()>> = lock(&self.timers).drain(..).collect();
        for timer in timers {
            if let Err(err) = timer.await {
                warn!(error = %err, "refresh timer ended abnormally");
            }
        }
        let in_flight: Vec<(Period, JoinHandle<()>)> = {
            let mut slots = lock(&self.shared.slots);
            slots.closed = true;
            slots
                .periods
                .iter_mut()
                .filter_map(|(period, slot)| slot.in_flight.take().map(|handle| (*period, handle)))
                .collect()
        };
        for (period, handle) in in_flight {
            if let Err(err) = handle.await {
                warn!(%period, error = %err, "refresh task ended abnormally");
            }
        }
        info!("refresh scheduler drained");
    }
}

async fn run_timer(
    scheduler: RefreshScheduler,
    period: Period,
    cadence: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                scheduler.trigger(period);
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!(%period, "refresh timer stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
