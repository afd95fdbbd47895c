use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use leaderboard_core::{Period, RankingAccumulator};
use leaderboard_db::{Db, DbError, LedgerScan, UsageLedger};
use tracing::{debug, error, info, warn};

use crate::error::AggregationError;
use crate::services::SharedConfig;

/// Opens a read handle on the usage ledger for one refresh run.
pub trait LedgerConnector: Send + Sync {
    fn connect(&self) -> leaderboard_db::Result<Box<dyn UsageLedger>>;
}

/// Ledger stored in the `usage_event` table of a SQLite file.
#[derive(Clone, Debug)]
pub struct SqliteLedger {
    db_path: PathBuf,
}

impl SqliteLedger {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}

impl LedgerConnector for SqliteLedger {
    fn connect(&self) -> leaderboard_db::Result<Box<dyn UsageLedger>> {
        Ok(Box::new(Db::open(&self.db_path)?))
    }
}

/// Builds a period's rankings into a fresh generation and promotes it.
#[derive(Clone)]
pub struct Aggregator {
    config: SharedConfig,
    ledger: Arc<dyn LedgerConnector>,
}

impl Aggregator {
    pub(super) fn new(config: SharedConfig, ledger: Arc<dyn LedgerConnector>) -> Self {
        Self { config, ledger }
    }

    /// Computes `period` as of `as_of` and makes it current. On any failure
    /// the new generation is marked failed and the previous current one stays
    /// authoritative.
    pub fn compute(
        &self,
        period: Period,
        as_of: DateTime<Utc>,
    ) -> Result<i64, AggregationError> {
        let started = Instant::now();
        let mut store =
            Db::open(&self.config.db_path).map_err(AggregationError::WriteFailure)?;
        let expected = store
            .current_generation(period)
            .map_err(AggregationError::WriteFailure)?;
        let generation_id = store
            .create_generation(period, as_of)
            .map_err(AggregationError::WriteFailure)?;
        info!(%period, generation_id, as_of = %as_of, "leaderboard refresh started");

        let rows = match self.build(&mut store, period, generation_id, as_of) {
            Ok(rows) => rows,
            Err(err) => return Err(abandon(&mut store, period, generation_id, err)),
        };
        if let Err(err) = store.promote(generation_id, period, expected) {
            let err = match err {
                err @ DbError::PromotionConflict { .. } => AggregationError::PromotionConflict(err),
                err => AggregationError::WriteFailure(err),
            };
            return Err(abandon(&mut store, period, generation_id, err));
        }
        info!(
            %period,
            generation_id,
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "leaderboard generation promoted"
        );

        let keep_last_n = self.config.engine.retention.keep_last_n;
        match store.gc(period, keep_last_n) {
            Ok(0) => {}
            Ok(removed) => debug!(%period, removed, keep_last_n, "old generations removed"),
            Err(err) => warn!(%period, error = %err, "generation cleanup failed"),
        }
        Ok(generation_id)
    }

    fn build(
        &self,
        store: &mut Db,
        period: Period,
        generation_id: i64,
        as_of: DateTime<Utc>,
    ) -> Result<usize, AggregationError> {
        let ledger = self
            .ledger
            .connect()
            .map_err(AggregationError::SourceUnavailable)?;
        let mut accumulator = RankingAccumulator::new();
        let mut scan = LedgerScan::new(
            ledger.as_ref(),
            period.window(as_of),
            self.config.engine.ledger.page_size,
        );
        for event in scan.by_ref() {
            accumulator.push(&event.map_err(AggregationError::SourceUnavailable)?);
        }
        debug!(
            %period,
            generation_id,
            pages = scan.pages_fetched(),
            events = accumulator.event_count(),
            users = accumulator.user_count(),
            "ledger scan finished"
        );

        let rows = accumulator.finish(period, generation_id, as_of);
        if rows.is_empty() {
            info!(%period, generation_id, "no usage in window, promoting empty generation");
        }
        store
            .insert_ranking_rows(generation_id, &rows)
            .map_err(AggregationError::WriteFailure)
    }
}

/// Marks the run's generation failed and logs the cause.
fn abandon(
    store: &mut Db,
    period: Period,
    generation_id: i64,
    err: AggregationError,
) -> AggregationError {
    if let Err(mark_err) = store.mark_generation_failed(generation_id, &err.to_string()) {
        warn!(%period, generation_id, error = %mark_err, "could not mark generation failed");
    }
    match &err {
        AggregationError::PromotionConflict(_) => error!(
            %period,
            generation_id,
            escalation = true,
            error = %err,
            "current pointer moved during refresh"
        ),
        _ => error!(
            %period,
            generation_id,
            kind = err.kind(),
            error = %err,
            "leaderboard refresh failed"
        ),
    }
    err
}
