use rusqlite::Connection;

use crate::Db;
use crate::error::Result;

const MIGRATION_0001: &str = include_str!("../migrations/0001_usage_ledger.sql");
const MIGRATION_0002: &str = include_str!("../migrations/0002_leaderboard_snapshot.sql");

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_usage_ledger", MIGRATION_0001),
    ("0002_leaderboard_snapshot", MIGRATION_0002),
];

impl Db {
    pub fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (name, sql) in MIGRATIONS {
            if *name == "0001_usage_ledger" && table_exists(&tx, "usage_event")? {
                ensure_ledger_columns(&tx)?;
            }
            tx.execute_batch(sql)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

// Ledgers created before cache accounting lack `cached_tokens`.
fn ensure_ledger_columns(conn: &Connection) -> Result<()> {
    if !table_has_column(conn, "usage_event", "cached_tokens")? {
        conn.execute(
            "ALTER TABLE usage_event ADD COLUMN cached_tokens INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }
    Ok(())
}
