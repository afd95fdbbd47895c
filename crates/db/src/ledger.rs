use std::collections::VecDeque;

use leaderboard_core::{TimeWindow, UsageEvent};
use rusqlite::params;

use crate::Db;
use crate::error::Result;
use crate::helpers::{format_ts, row_to_usage_event, sql_int};

/// Keyset position inside the ledger: the last `(occurred_at, id)` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCursor {
    pub occurred_at: String,
    pub id: String,
}

impl LedgerCursor {
    fn after(event: &UsageEvent) -> Self {
        Self {
            occurred_at: format_ts(event.occurred_at),
            id: event.id.clone(),
        }
    }
}

/// Read side of the usage ledger.
pub trait UsageLedger {
    /// Up to `limit` events inside `window`, ordered by `(occurred_at, id)`,
    /// strictly after `after` when given.
    fn fetch_page(
        &self,
        window: &TimeWindow,
        after: Option<&LedgerCursor>,
        limit: usize,
    ) -> Result<Vec<UsageEvent>>;
}

/// Lazy iterator over every event in a window, one ledger page at a time.
pub struct LedgerScan<'a, L: UsageLedger + ?Sized> {
    ledger: &'a L,
    window: TimeWindow,
    page_size: usize,
    cursor: Option<LedgerCursor>,
    buffer: VecDeque<UsageEvent>,
    exhausted: bool,
    pages: u64,
}

impl<'a, L: UsageLedger + ?Sized> LedgerScan<'a, L> {
    pub fn new(ledger: &'a L, window: TimeWindow, page_size: usize) -> Self {
        Self {
            ledger,
            window,
            page_size: page_size.max(1),
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
            pages: 0,
        }
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages
    }

    fn fill(&mut self) -> Result<()> {
        let page = self
            .ledger
            .fetch_page(&self.window, self.cursor.as_ref(), self.page_size)?;
        self.pages += 1;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(LedgerCursor::after(last));
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<L: UsageLedger + ?Sized> Iterator for LedgerScan<'_, L> {
    type Item = Result<UsageEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl UsageLedger for Db {
    fn fetch_page(
        &self,
        window: &TimeWindow,
        after: Option<&LedgerCursor>,
        limit: usize,
    ) -> Result<Vec<UsageEvent>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT id, user_id, tokens, cached_tokens, cost, tool, occurred_at
            FROM usage_event
            WHERE occurred_at < ?1
              AND (?2 IS NULL OR occurred_at >= ?2)
              AND (?3 IS NULL OR occurred_at > ?3 OR (occurred_at = ?3 AND id > ?4))
            ORDER BY occurred_at ASC, id ASC
            LIMIT ?5
            "#,
        )?;
        let rows = stmt.query_map(
            params![
                format_ts(window.end),
                window.start.map(format_ts),
                after.map(|cursor| cursor.occurred_at.as_str()),
                after.map(|cursor| cursor.id.as_str()),
                sql_int(limit),
            ],
            row_to_usage_event,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl Db {
    pub fn insert_usage_events(&mut self, events: &[UsageEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO usage_event (
                  id, user_id, tokens, cached_tokens, cost, tool, occurred_at
                ) VALUES (
                  ?1, ?2, ?3, ?4, ?5, ?6, ?7
                )
                "#,
            )?;
            for event in events {
                let rows = stmt.execute(params![
                    event.id,
                    event.user_id,
                    sql_int(event.tokens),
                    sql_int(event.cached_tokens),
                    event.cost,
                    event.tool,
                    format_ts(event.occurred_at),
                ])?;
                if rows > 0 {
                    inserted += 1;
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn count_usage_events(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM usage_event", [], |row| row.get(0))?)
    }
}
