mod support;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use leaderboard_app::{
    AggregationError, Refresh, RefreshConfig, RefreshEventKind, RefreshScheduler, RefreshState,
    TriggerOutcome,
};
use leaderboard_core::{Period, UsageEvent};
use leaderboard_db::DbError;
use support::{make_event, setup_app, ts};

/// Blocks each refresh until the test releases it.
struct GatedRefresher {
    calls: AtomicUsize,
    release: Mutex<mpsc::Receiver<()>>,
}

impl Refresh for GatedRefresher {
    fn refresh(&self, _period: Period) -> Result<i64, AggregationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let release = self.release.lock().expect("release lock");
        release
            .recv_timeout(Duration::from_secs(5))
            .expect("released");
        Ok(7)
    }
}

struct SlowRefresher {
    finished: AtomicBool,
}

impl Refresh for SlowRefresher {
    fn refresh(&self, _period: Period) -> Result<i64, AggregationError> {
        std::thread::sleep(Duration::from_millis(150));
        self.finished.store(true, Ordering::SeqCst);
        Ok(1)
    }
}

struct FailingRefresher {
    calls: AtomicUsize,
}

impl Refresh for FailingRefresher {
    fn refresh(&self, _period: Period) -> Result<i64, AggregationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AggregationError::SourceUnavailable(DbError::Unavailable(
            "ledger replica offline".to_string(),
        )))
    }
}

struct CountingRefresher {
    calls: Mutex<Vec<Period>>,
}

impl Refresh for CountingRefresher {
    fn refresh(&self, period: Period) -> Result<i64, AggregationError> {
        let mut calls = self.calls.lock().expect("calls lock");
        calls.push(period);
        Ok(calls.len() as i64)
    }
}

async fn wait_until_idle(scheduler: &RefreshScheduler, period: Period) {
    for _ in 0..200 {
        let status = scheduler.status(period).expect("status");
        if status.state == RefreshState::Idle {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{period} refresh never finished");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_trigger_is_skipped() {
    let (release, gate) = mpsc::channel();
    let refresher = Arc::new(GatedRefresher {
        calls: AtomicUsize::new(0),
        release: Mutex::new(gate),
    });
    let scheduler = RefreshScheduler::new(refresher.clone(), RefreshConfig::default());

    assert_eq!(scheduler.trigger(Period::Week), TriggerOutcome::Started);
    assert_eq!(scheduler.trigger(Period::Week), TriggerOutcome::Skipped);
    release.send(()).expect("release");
    scheduler.shutdown().await;

    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    let status = scheduler.status(Period::Week).expect("status");
    assert_eq!(status.state, RefreshState::Idle);
    assert_eq!(status.runs, 1);
    assert_eq!(status.skips, 1);
    assert_eq!(status.successes, 1);
    assert_eq!(status.last_generation_id, Some(7));

    let kinds: Vec<RefreshEventKind> = scheduler
        .events()
        .into_iter()
        .map(|event| event.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            RefreshEventKind::Started,
            RefreshEventKind::Skipped,
            RefreshEventKind::Succeeded { generation_id: 7 },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periods_refresh_independently() {
    let (release, gate) = mpsc::channel();
    let refresher = Arc::new(GatedRefresher {
        calls: AtomicUsize::new(0),
        release: Mutex::new(gate),
    });
    let scheduler = RefreshScheduler::new(refresher.clone(), RefreshConfig::default());

    assert_eq!(scheduler.trigger(Period::Week), TriggerOutcome::Started);
    assert_eq!(scheduler.trigger(Period::Month), TriggerOutcome::Started);
    release.send(()).expect("release first");
    release.send(()).expect("release second");
    scheduler.shutdown().await;

    assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
    let status = scheduler.status(Period::Month).expect("status");
    assert_eq!(status.skips, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_drains_in_flight_refresh() {
    let refresher = Arc::new(SlowRefresher {
        finished: AtomicBool::new(false),
    });
    let scheduler = RefreshScheduler::new(refresher.clone(), RefreshConfig::default());

    assert_eq!(scheduler.trigger(Period::All), TriggerOutcome::Started);
    scheduler.shutdown().await;

    assert!(refresher.finished.load(Ordering::SeqCst));
    assert_eq!(scheduler.trigger(Period::All), TriggerOutcome::Stopped);
    let status = scheduler.status(Period::All).expect("status");
    assert_eq!(status.successes, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_is_recorded_and_next_tick_runs() {
    let refresher = Arc::new(FailingRefresher {
        calls: AtomicUsize::new(0),
    });
    let scheduler = RefreshScheduler::new(refresher.clone(), RefreshConfig::default());

    assert_eq!(scheduler.trigger(Period::Month), TriggerOutcome::Started);
    wait_until_idle(&scheduler, Period::Month).await;

    let status = scheduler.status(Period::Month).expect("status");
    assert_eq!(status.failures, 1);
    assert!(status.last_failure_at.is_some());
    assert!(
        status
            .last_error
            .as_deref()
            .is_some_and(|message| message.contains("offline"))
    );
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);

    assert_eq!(scheduler.trigger(Period::Month), TriggerOutcome::Started);
    scheduler.shutdown().await;
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
    assert!(
        scheduler
            .events()
            .iter()
            .any(|event| matches!(event.kind, RefreshEventKind::Failed { .. }))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timers_fire_immediately_for_every_period() {
    let refresher = Arc::new(CountingRefresher {
        calls: Mutex::new(Vec::new()),
    });
    let scheduler = RefreshScheduler::new(refresher.clone(), RefreshConfig::default());
    scheduler.start();

    for period in Period::ALL {
        for _ in 0..200 {
            let status = scheduler.status(period).expect("status");
            if status.successes > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
    scheduler.shutdown().await;

    let mut periods = refresher.calls.lock().expect("calls lock").clone();
    periods.sort();
    assert_eq!(periods, vec![Period::All, Period::Month, Period::Week]);
    let statuses = scheduler.statuses();
    assert_eq!(statuses.len(), 3);
    assert_eq!(statuses[2].cadence_secs, 3600);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn event_log_is_bounded() {
    let (release, gate) = mpsc::channel();
    let refresher = Arc::new(GatedRefresher {
        calls: AtomicUsize::new(0),
        release: Mutex::new(gate),
    });
    let config = RefreshConfig {
        event_log_capacity: 4,
        ..RefreshConfig::default()
    };
    let scheduler = RefreshScheduler::new(refresher, config);
    assert_eq!(scheduler.trigger(Period::Week), TriggerOutcome::Started);
    for _ in 0..10 {
        assert_eq!(scheduler.trigger(Period::Week), TriggerOutcome::Skipped);
    }
    release.send(()).expect("release");
    scheduler.shutdown().await;

    let events = scheduler.events();
    assert_eq!(events.len(), 4);
    assert_eq!(
        events.last().map(|event| event.kind.clone()),
        Some(RefreshEventKind::Succeeded { generation_id: 7 })
    );
    assert_eq!(scheduler.status(Period::Week).expect("status").skips, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn drives_real_aggregator() {
    let app = setup_app();
    let events: Vec<UsageEvent> = vec![
        make_event("e1", "alice", 500, ts(19, 9)),
        make_event("e2", "bob", 300, ts(19, 10)),
    ];
    app.seed(&events);

    let scheduler = app.state.scheduler();
    assert_eq!(scheduler.trigger(Period::All), TriggerOutcome::Started);
    scheduler.shutdown().await;

    let status = scheduler.status(Period::All).expect("status");
    assert_eq!(status.successes, 1);
    let db = app.state.open_db().expect("open db");
    assert_eq!(
        db.current_generation(Period::All).expect("current"),
        status.last_generation_id
    );
}
