#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use leaderboard_core::{Period, RankingRow, UsageEvent, assign_ranks};
use leaderboard_db::Db;
use tempfile::TempDir;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, day, hour, 0, 0).unwrap()
}

pub fn make_event(id: &str, user_id: &str, tokens: u64, occurred_at: DateTime<Utc>) -> UsageEvent {
    UsageEvent {
        id: id.to_string(),
        user_id: user_id.to_string(),
        tokens,
        cached_tokens: 0,
        cost: 0.01,
        tool: "cli".to_string(),
        occurred_at,
    }
}

/// `count` ranked rows with distinct token totals, user-01 on top.
pub fn make_rows(period: Period, generation_id: i64, count: usize) -> Vec<RankingRow> {
    let mut rows: Vec<RankingRow> = (1..=count)
        .map(|index| RankingRow {
            period,
            generation_id,
            user_id: format!("user-{index:02}"),
            rank: 0,
            total_tokens: ((count - index + 1) * 100) as u64,
            total_cost: index as f64,
            avg_cost: 1.0,
            event_count: index as u64,
            streak_days: (index % 5) as u32,
            unique_tools: (index % 3) as u32 + 1,
            cache_efficiency: 0.0,
        })
        .collect();
    assign_ranks(&mut rows);
    rows
}

/// Builds and promotes a generation holding `count` rows.
pub fn promoted_generation(db: &mut Db, period: Period, count: usize) -> i64 {
    let expected = db.current_generation(period).expect("current");
    let id = db.create_generation(period, ts(20, 12)).expect("create");
    db.insert_ranking_rows(id, &make_rows(period, id, count))
        .expect("insert rows");
    db.promote(id, period, expected).expect("promote");
    id
}
