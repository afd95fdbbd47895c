mod aggregator;
mod leaderboard;

use std::sync::Arc;

use crate::app::AppConfig;
use crate::error::Result;
use leaderboard_db::Db;

pub use aggregator::{Aggregator, LedgerConnector, SqliteLedger};
pub use leaderboard::{LeaderboardQuery, LeaderboardService, PageSpec};

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub leaderboard: LeaderboardService,
    pub aggregator: Aggregator,
}

impl AppServices {
    pub fn new(config: &AppConfig) -> Self {
        let ledger = Arc::new(SqliteLedger::new(config.db_path.clone()));
        Self::with_ledger(config, ledger)
    }

    pub fn with_ledger(config: &AppConfig, ledger: Arc<dyn LedgerConnector>) -> Self {
        let shared = Arc::new(config.clone());
        Self {
            leaderboard: LeaderboardService::new(shared.clone()),
            aggregator: Aggregator::new(shared, ledger),
        }
    }
}

fn open_db(config: &SharedConfig) -> Result<Db> {
    Ok(Db::open(&config.db_path)?)
}
