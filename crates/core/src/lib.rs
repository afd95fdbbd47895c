use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub mod ranking;

pub use ranking::{RankingAccumulator, assign_ranks, streak_ending_at};

/// Time window a leaderboard is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    All,
    Month,
    Week,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::All, Period::Month, Period::Week];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Month => "month",
            Period::Week => "week",
        }
    }

    /// Trailing span covered by the period, `None` for all-time.
    pub fn span(&self) -> Option<Duration> {
        match self {
            Period::All => None,
            Period::Month => Some(Duration::days(30)),
            Period::Week => Some(Duration::days(7)),
        }
    }

    pub fn window(&self, as_of: DateTime<Utc>) -> TimeWindow {
        TimeWindow {
            start: self.span().map(|span| as_of - span),
            end: as_of,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPeriod(pub String);

impl fmt::Display for UnknownPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown period {}", self.0)
    }
}

impl std::error::Error for UnknownPeriod {}

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Period::All),
            "month" => Ok(Period::Month),
            "week" => Ok(Period::Week),
            _ => Err(UnknownPeriod(value.to_string())),
        }
    }
}

/// Half-open `[start, end)` range; an absent start is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if let Some(start) = self.start
            && ts < start
        {
            return false;
        }
        ts < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    pub user_id: String,
    pub tokens: u64,
    pub cached_tokens: u64,
    pub cost: f64,
    pub tool: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Building,
    Complete,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Building => "building",
            GenerationStatus::Complete => "complete",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "building" => Some(GenerationStatus::Building),
            "complete" => Some(GenerationStatus::Complete),
            "failed" => Some(GenerationStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One computation run of a period's rankings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub id: i64,
    pub period: Period,
    pub status: GenerationStatus,
    pub as_of: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub row_count: u64,
    pub error: Option<String>,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    pub period: Period,
    pub generation_id: i64,
    pub user_id: String,
    pub rank: u32,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub avg_cost: f64,
    pub event_count: u64,
    pub streak_days: u32,
    pub unique_tools: u32,
    pub cache_efficiency: f64,
}

/// Structured filter over a generation's rows. Empty fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<String>,
    pub min_rank: Option<u32>,
    pub max_rank: Option<u32>,
    pub min_tokens: Option<u64>,
    pub max_tokens: Option<u64>,
    pub min_streak: Option<u32>,
    pub min_tools: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Rank,
    TotalTokens,
    TotalCost,
    AvgCost,
    StreakDays,
    UniqueTools,
    CacheEfficiency,
    UserId,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Rank => "rank",
            SortField::TotalTokens => "total_tokens",
            SortField::TotalCost => "total_cost",
            SortField::AvgCost => "avg_cost",
            SortField::StreakDays => "streak_days",
            SortField::UniqueTools => "unique_tools",
            SortField::CacheEfficiency => "cache_efficiency",
            SortField::UserId => "user_id",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rank" => Some(SortField::Rank),
            "total_tokens" | "tokens" => Some(SortField::TotalTokens),
            "total_cost" | "cost" => Some(SortField::TotalCost),
            "avg_cost" => Some(SortField::AvgCost),
            "streak_days" | "streak" => Some(SortField::StreakDays),
            "unique_tools" | "tools" => Some(SortField::UniqueTools),
            "cache_efficiency" => Some(SortField::CacheEfficiency),
            "user_id" => Some(SortField::UserId),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub offset: u64,
    pub has_next: bool,
}

impl PaginationMeta {
    pub fn new(page: PageRequest, total_count: u64) -> Self {
        let page_number = if page.limit == 0 {
            1
        } else {
            page.offset / page.limit + 1
        };
        Self {
            total_count,
            page: page_number,
            page_size: page.limit,
            offset: page.offset,
            has_next: page.offset.saturating_add(page.limit) < total_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPage {
    pub period: Period,
    pub generation_id: Option<i64>,
    pub computed_at: Option<DateTime<Utc>>,
    pub entries: Vec<RankingRow>,
    pub pagination: PaginationMeta,
}
