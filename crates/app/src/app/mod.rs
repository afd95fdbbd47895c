use std::path::{Path, PathBuf};
use std::sync::Arc;

use leaderboard_db::Db;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::scheduler::RefreshScheduler;
use crate::services::{AppServices, LedgerConnector};

/// Database location and engine tunables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub engine: EngineConfig,
}

/// Application state shared by the server and the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db_path: PathBuf, engine: EngineConfig) -> Self {
        let config = AppConfig { db_path, engine };
        let services = AppServices::new(&config);
        Self { config, services }
    }

    /// Same as [`AppState::new`] but the aggregator scans `ledger` instead of
    /// the usage table inside `db_path`.
    pub fn with_ledger(
        db_path: PathBuf,
        engine: EngineConfig,
        ledger: Arc<dyn LedgerConnector>,
    ) -> Self {
        let config = AppConfig { db_path, engine };
        let services = AppServices::with_ledger(&config, ledger);
        Self { config, services }
    }

    pub fn setup_db(&self) -> Result<()> {
        setup_db(&self.config.db_path)
    }

    /// Validates config, migrates, and fails any generation a previous
    /// process left in `building`.
    pub fn initialize(&self) -> Result<()> {
        self.config.engine.validate()?;
        self.setup_db()
            .map_err(|err| AppError::Message(format!("initialize db: {}", err)))?;
        let mut db = self.open_db()?;
        let orphaned = db.fail_orphaned_generations()?;
        if orphaned > 0 {
            warn!(orphaned, "failed generations abandoned by a previous run");
        }
        info!(db_path = %self.config.db_path.display(), "leaderboard store ready");
        Ok(())
    }

    pub fn open_db(&self) -> Result<Db> {
        Ok(Db::open(&self.config.db_path)?)
    }

    /// Scheduler driving the aggregator; timers start with
    /// [`RefreshScheduler::start`].
    pub fn scheduler(&self) -> RefreshScheduler {
        RefreshScheduler::new(
            Arc::new(self.services.aggregator.clone()),
            self.config.engine.refresh.clone(),
        )
    }
}

pub fn setup_db(path: &Path) -> Result<()> {
    let mut db = Db::open(path)?;
    db.migrate()?;
    Ok(())
}
