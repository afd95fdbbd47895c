#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use leaderboard_app::{AppState, EngineConfig, LedgerConnector};
use leaderboard_core::UsageEvent;
use tempfile::TempDir;

pub struct TestApp {
    pub _dir: TempDir,
    pub state: AppState,
}

impl TestApp {
    pub fn new(engine: EngineConfig) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let state = AppState::new(dir.path().join("leaderboard.sqlite"), engine);
        state.initialize().expect("initialize");
        Self { _dir: dir, state }
    }

    /// A second state over the same database whose aggregator reads `ledger`.
    pub fn with_ledger(&self, ledger: Arc<dyn LedgerConnector>) -> AppState {
        AppState::with_ledger(
            self.state.config.db_path.clone(),
            self.state.config.engine.clone(),
            ledger,
        )
    }

    pub fn seed(&self, events: &[UsageEvent]) {
        let mut db = self.state.open_db().expect("open db");
        db.insert_usage_events(events).expect("insert events");
    }
}

pub fn setup_app() -> TestApp {
    TestApp::new(EngineConfig::default())
}

/// Refresh instant used across tests.
pub fn as_of() -> DateTime<Utc> {
    ts(20, 12)
}

pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub fn make_event(id: &str, user: &str, tokens: u64, at: DateTime<Utc>) -> UsageEvent {
    UsageEvent {
        id: id.to_string(),
        user_id: user.to_string(),
        tokens,
        cached_tokens: tokens / 4,
        cost: tokens as f64 / 1000.0,
        tool: "cli".to_string(),
        occurred_at: at,
    }
}
