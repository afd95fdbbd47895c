use std::time::Duration;

use leaderboard_core::Period;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Longest refresh cadence accepted; larger values overflow timer deadlines.
pub const MAX_CADENCE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Tunables for refresh cadence, retention, query paging and ledger scans.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub refresh: RefreshConfig,
    pub retention: RetentionConfig,
    pub query: QueryConfig,
    pub ledger: LedgerConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        for period in Period::ALL {
            let cadence = self.refresh.cadence(period);
            if cadence.is_zero() {
                return Err(AppError::Config(format!(
                    "refresh cadence for {period} must be positive"
                )));
            }
            if cadence > MAX_CADENCE {
                return Err(AppError::Config(format!(
                    "refresh cadence for {period} exceeds {} seconds",
                    MAX_CADENCE.as_secs()
                )));
            }
        }
        if self.refresh.event_log_capacity == 0 {
            return Err(AppError::Config(
                "refresh.event_log_capacity must be positive".to_string(),
            ));
        }
        if self.query.max_page_size == 0 || self.query.default_page_size == 0 {
            return Err(AppError::Config("query page sizes must be positive".to_string()));
        }
        if self.query.default_page_size > self.query.max_page_size {
            return Err(AppError::Config(format!(
                "query.default_page_size {} exceeds query.max_page_size {}",
                self.query.default_page_size, self.query.max_page_size
            )));
        }
        if self.ledger.page_size == 0 {
            return Err(AppError::Config("ledger.page_size must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub week_secs: u64,
    pub month_secs: u64,
    pub all_secs: u64,
    pub event_log_capacity: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            week_secs: 60 * 60,
            month_secs: 6 * 60 * 60,
            all_secs: 24 * 60 * 60,
            event_log_capacity: 200,
        }
    }
}

impl RefreshConfig {
    pub fn cadence(&self, period: Period) -> Duration {
        let secs = match period {
            Period::Week => self.week_secs,
            Period::Month => self.month_secs,
            Period::All => self.all_secs,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub keep_last_n: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { keep_last_n: 3 }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { page_size: 5000 }
    }
}
