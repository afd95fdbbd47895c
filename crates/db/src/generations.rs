use chrono::{DateTime, Utc};
use leaderboard_core::{Generation, GenerationStatus, Period};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::Db;
use crate::error::{DbError, Result};
use crate::helpers::{GENERATION_COLUMNS, format_ts, row_to_generation, sql_int};

impl Db {
    /// Opens a new `building` generation and returns its id.
    pub fn create_generation(&self, period: Period, as_of: DateTime<Utc>) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO leaderboard_generation (period, status, as_of, started_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                period.as_str(),
                GenerationStatus::Building.as_str(),
                format_ts(as_of),
                format_ts(Utc::now()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn generation(&self, generation_id: i64) -> Result<Option<Generation>> {
        load_generation(&self.conn, generation_id)
    }

    pub fn current_generation(&self, period: Period) -> Result<Option<i64>> {
        current_pointer(&self.conn, period)
    }

    pub fn list_generations(&self, period: Period, limit: usize) -> Result<Vec<Generation>> {
        let sql = format!(
            r#"
            SELECT {GENERATION_COLUMNS}
            FROM leaderboard_generation g
            LEFT JOIN leaderboard_current c
              ON c.period = g.period AND c.generation_id = g.id
            WHERE g.period = ?1
            ORDER BY g.id DESC
            LIMIT ?2
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let limit = if limit == 0 { -1 } else { sql_int(limit) };
        let rows = stmt.query_map(params![period.as_str(), limit], row_to_generation)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Marks `generation_id` complete and moves the period's current pointer to
    /// it in one transaction. The pointer must still hold `expected_current`.
    pub fn promote(
        &mut self,
        generation_id: i64,
        period: Period,
        expected_current: Option<i64>,
    ) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM leaderboard_generation WHERE id = ?1 AND period = ?2",
                params![generation_id, period.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match status.as_deref().and_then(GenerationStatus::parse) {
            Some(GenerationStatus::Building) => {}
            other => {
                return Err(DbError::GenerationState {
                    generation_id,
                    status: other
                        .map(|status| status.to_string())
                        .unwrap_or_else(|| "missing".to_string()),
                });
            }
        }

        let actual = current_pointer(&tx, period)?;
        let regresses = actual.is_some_and(|current| current >= generation_id);
        if actual != expected_current || regresses {
            return Err(DbError::PromotionConflict {
                period,
                expected: expected_current,
                actual,
            });
        }

        let now = format_ts(Utc::now());
        let row_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM leaderboard_row WHERE generation_id = ?1",
            params![generation_id],
            |row| row.get(0),
        )?;
        tx.execute(
            r#"
            UPDATE leaderboard_generation
            SET status = ?2, completed_at = ?3, row_count = ?4
            WHERE id = ?1
            "#,
            params![
                generation_id,
                GenerationStatus::Complete.as_str(),
                now,
                row_count
            ],
        )?;
        tx.execute(
            r#"
            INSERT INTO leaderboard_current (period, generation_id, promoted_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(period) DO UPDATE SET
              generation_id = excluded.generation_id,
              promoted_at = excluded.promoted_at
            "#,
            params![period.as_str(), generation_id, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Flags a `building` generation as failed and drops its partial rows.
    pub fn mark_generation_failed(&mut self, generation_id: i64, message: &str) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let updated = tx.execute(
            r#"
            UPDATE leaderboard_generation
            SET status = ?2, completed_at = ?3, error = ?4, row_count = 0
            WHERE id = ?1 AND status = ?5
            "#,
            params![
                generation_id,
                GenerationStatus::Failed.as_str(),
                format_ts(Utc::now()),
                message,
                GenerationStatus::Building.as_str(),
            ],
        )?;
        if updated > 0 {
            tx.execute(
                "DELETE FROM leaderboard_row WHERE generation_id = ?1",
                params![generation_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Fails every generation left in `building` by a previous process.
    pub fn fail_orphaned_generations(&mut self) -> Result<usize> {
        let orphaned: Vec<i64> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM leaderboard_generation WHERE status = ?1")?;
            let rows = stmt.query_map(params![GenerationStatus::Building.as_str()], |row| {
                row.get(0)
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        for generation_id in &orphaned {
            self.mark_generation_failed(*generation_id, "abandoned before completion")?;
        }
        Ok(orphaned.len())
    }

    /// Keeps the newest `keep_last_n` complete generations of `period` plus the
    /// current one; older complete and failed generations are removed with
    /// their rows. `building` generations are never touched.
    pub fn gc(&mut self, period: Period, keep_last_n: usize) -> Result<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = current_pointer(&tx, period)?;
        let complete: Vec<i64> = {
            let mut stmt = tx.prepare(
                r#"
                SELECT id FROM leaderboard_generation
                WHERE period = ?1 AND status = ?2
                ORDER BY id DESC
                "#,
            )?;
            let rows = stmt.query_map(
                params![period.as_str(), GenerationStatus::Complete.as_str()],
                |row| row.get(0),
            )?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        let kept: Vec<i64> = complete
            .iter()
            .copied()
            .take(keep_last_n)
            .chain(current)
            .collect();
        let mut doomed: Vec<i64> = complete
            .iter()
            .copied()
            .filter(|id| !kept.contains(id))
            .collect();
        if let Some(oldest_kept) = kept.iter().copied().min() {
            let mut stmt = tx.prepare(
                r#"
                SELECT id FROM leaderboard_generation
                WHERE period = ?1 AND status = ?2 AND id < ?3
                "#,
            )?;
            let rows = stmt.query_map(
                params![
                    period.as_str(),
                    GenerationStatus::Failed.as_str(),
                    oldest_kept
                ],
                |row| row.get::<_, i64>(0),
            )?;
            for id in rows {
                doomed.push(id?);
            }
        }
        for id in &doomed {
            tx.execute(
                "DELETE FROM leaderboard_row WHERE generation_id = ?1",
                params![id],
            )?;
            tx.execute(
                "DELETE FROM leaderboard_generation WHERE id = ?1",
                params![id],
            )?;
        }
        tx.commit()?;
        Ok(doomed.len())
    }
}

pub(crate) fn current_pointer(conn: &Connection, period: Period) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT generation_id FROM leaderboard_current WHERE period = ?1",
            params![period.as_str()],
            |row| row.get(0),
        )
        .optional()?)
}

pub(crate) fn load_generation(conn: &Connection, generation_id: i64) -> Result<Option<Generation>> {
    let sql = format!(
        r#"
        SELECT {GENERATION_COLUMNS}
        FROM leaderboard_generation g
        LEFT JOIN leaderboard_current c
          ON c.period = g.period AND c.generation_id = g.id
        WHERE g.id = ?1
        "#
    );
    Ok(conn
        .query_row(&sql, params![generation_id], row_to_generation)
        .optional()?)
}
