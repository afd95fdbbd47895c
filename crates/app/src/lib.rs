pub mod app;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod services;
pub mod startup;
pub mod telemetry;

pub use app::{AppConfig, AppState};
pub use config::{EngineConfig, LedgerConfig, QueryConfig, RefreshConfig, RetentionConfig};
pub use error::{AggregationError, ApiError, AppError, Result};
pub use scheduler::{
    PeriodStatus, Refresh, RefreshEvent, RefreshEventKind, RefreshScheduler, RefreshState,
    TriggerOutcome,
};
pub use services::{
    Aggregator, AppServices, LeaderboardQuery, LeaderboardService, LedgerConnector, PageSpec,
    SqliteLedger,
};
pub use startup::{AppPaths, ensure_app_data_dir};
pub use telemetry::{TracingConfig, init_tracing};
