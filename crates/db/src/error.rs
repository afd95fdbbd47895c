use leaderboard_core::Period;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("usage ledger unavailable: {0}")]
    Unavailable(String),
    #[error(
        "promotion conflict for {period}: expected current {expected:?}, found {actual:?}"
    )]
    PromotionConflict {
        period: Period,
        expected: Option<i64>,
        actual: Option<i64>,
    },
    #[error("generation {generation_id} is {status}, expected building")]
    GenerationState { generation_id: i64, status: String },
    #[error("generation {0} not found")]
    GenerationNotFound(i64),
}

pub type Result<T> = std::result::Result<T, DbError>;
