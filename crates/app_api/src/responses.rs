use chrono::{DateTime, Utc};
use leaderboard_app::{PeriodStatus, RefreshEvent, TriggerOutcome};
use leaderboard_core::{Generation, PaginationMeta, Period, RankingRow};
use serde::Serialize;

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub period: Period,
    pub entries: Vec<RankingRow>,
    pub pagination: PaginationMeta,
    pub generation_id: Option<i64>,
    pub computed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct StandingsResponse {
    pub user_id: String,
    pub standings: Vec<RankingRow>,
}

#[derive(Serialize)]
pub struct GenerationsResponse {
    pub period: Period,
    pub generations: Vec<Generation>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub period: Period,
    pub outcome: TriggerOutcome,
}

#[derive(Serialize)]
pub struct RefreshStatusResponse {
    pub periods: Vec<PeriodStatus>,
    pub events: Vec<RefreshEvent>,
}
