use leaderboard_core::{
    Generation, LeaderboardPage, PageRequest, PaginationMeta, Period, RankingFilter, RankingOrder,
    RankingRow,
};
use leaderboard_db::{Db, DbError};

use crate::config::QueryConfig;
use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db};

const DEFAULT_GENERATION_LIMIT: usize = 20;

/// How the caller addressed a page: by number or by raw offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSpec {
    Number { page: u64, page_size: Option<u64> },
    Offset { offset: u64, limit: Option<u64> },
}

impl Default for PageSpec {
    fn default() -> Self {
        PageSpec::Number {
            page: 1,
            page_size: None,
        }
    }
}

impl PageSpec {
    /// Applies the configured default and clamp to the page size.
    pub fn resolve(self, limits: &QueryConfig) -> Result<PageRequest> {
        let requested = match self {
            PageSpec::Number { page_size, .. } => page_size,
            PageSpec::Offset { limit, .. } => limit,
        };
        let size = requested.unwrap_or(limits.default_page_size);
        if size == 0 {
            return Err(AppError::InvalidInput(
                "page size must be at least 1".to_string(),
            ));
        }
        let limit = size.min(limits.max_page_size);
        let offset = match self {
            PageSpec::Number { page: 0, .. } => {
                return Err(AppError::InvalidInput("page must be at least 1".to_string()));
            }
            PageSpec::Number { page, .. } => (page - 1).saturating_mul(limit),
            PageSpec::Offset { offset, .. } => offset,
        };
        Ok(PageRequest { offset, limit })
    }
}

#[derive(Clone, Debug, Default)]
pub struct LeaderboardQuery {
    pub filter: RankingFilter,
    pub order: RankingOrder,
    pub page: PageSpec,
    /// Generation returned by an earlier page; keeps later pages on the same
    /// snapshot across promotions.
    pub generation: Option<i64>,
}

/// Read path over promoted snapshots. Never triggers computation.
#[derive(Clone)]
pub struct LeaderboardService {
    config: SharedConfig,
}

impl LeaderboardService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn query(&self, period: &str, query: &LeaderboardQuery) -> Result<LeaderboardPage> {
        let period: Period = period.parse()?;
        let page = query.page.resolve(&self.config.engine.query)?;
        let mut db = self.db()?;
        let snapshot = db
            .read_snapshot(period, query.generation, &query.filter, query.order, page)
            .map_err(|err| not_found_generation(err, period))?;
        Ok(match snapshot {
            Some(snapshot) => LeaderboardPage {
                period,
                generation_id: Some(snapshot.generation.id),
                computed_at: snapshot.generation.completed_at,
                entries: snapshot.rows,
                pagination: PaginationMeta::new(page, snapshot.total_count),
            },
            None => LeaderboardPage {
                period,
                generation_id: None,
                computed_at: None,
                entries: Vec::new(),
                pagination: PaginationMeta::new(page, 0),
            },
        })
    }

    /// The user's row in every period that has a current generation.
    pub fn standings(&self, user_id: &str) -> Result<Vec<RankingRow>> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AppError::InvalidInput("user_id is required".to_string()));
        }
        let mut db = self.db()?;
        Ok(db.user_standings(user_id)?)
    }

    pub fn generations(&self, period: &str, limit: Option<usize>) -> Result<Vec<Generation>> {
        let period: Period = period.parse()?;
        let db = self.db()?;
        Ok(db.list_generations(period, limit.unwrap_or(DEFAULT_GENERATION_LIMIT))?)
    }
}

fn not_found_generation(err: DbError, period: Period) -> AppError {
    match err {
        DbError::GenerationNotFound(id) => {
            AppError::NotFound(format!("generation {id} is not available for {period}"))
        }
        other => other.into(),
    }
}
