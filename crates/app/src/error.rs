use leaderboard_core::UnknownPeriod;
use leaderboard_db::DbError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("db error: {0}")]
    Db(#[from] DbError),
    #[error("refresh error: {0}")]
    Aggregation(#[from] AggregationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Message(String),
}

impl From<UnknownPeriod> for AppError {
    fn from(err: UnknownPeriod) -> Self {
        AppError::NotFound(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Why a refresh run did not promote a generation. The previous current
/// generation is left untouched in every case.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("usage ledger unavailable: {0}")]
    SourceUnavailable(#[source] DbError),
    #[error("snapshot write failed: {0}")]
    WriteFailure(#[source] DbError),
    #[error("{0}")]
    PromotionConflict(#[source] DbError),
}

impl AggregationError {
    pub fn kind(&self) -> &'static str {
        match self {
            AggregationError::SourceUnavailable(_) => "source_unavailable",
            AggregationError::WriteFailure(_) => "write_failure",
            AggregationError::PromotionConflict(_) => "promotion_conflict",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let (status, code) = match err {
            AppError::InvalidInput(_) => (400, Some("invalid_input".to_string())),
            AppError::NotFound(_) => (404, Some("not_found".to_string())),
            AppError::Db(_)
            | AppError::Aggregation(_)
            | AppError::Io(_)
            | AppError::Serde(_)
            | AppError::Config(_)
            | AppError::Message(_) => (500, None),
        };
        Self {
            status,
            message: err.to_string(),
            code,
        }
    }
}
