use leaderboard_core::{Generation, RankingRow};

/// Rows and total count read from one generation inside a single read transaction.
#[derive(Debug, Clone)]
pub struct SnapshotPage {
    pub generation: Generation,
    pub rows: Vec<RankingRow>,
    pub total_count: u64,
}
