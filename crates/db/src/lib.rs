mod error;
mod generations;
mod helpers;
mod ledger;
mod migrations;
mod rankings;
mod types;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

pub use error::{DbError, Result};
pub use helpers::{format_ts, parse_ts};
pub use ledger::{LedgerCursor, LedgerScan, UsageLedger};
pub use types::SnapshotPage;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }
}
