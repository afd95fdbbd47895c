use leaderboard_core::{
    GenerationStatus, PageRequest, Period, RankingFilter, RankingOrder, RankingRow, SortDirection,
    SortField,
};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use crate::Db;
use crate::error::{DbError, Result};
use crate::generations::{current_pointer, load_generation};
use crate::helpers::{RANKING_COLUMNS, row_to_ranking_row, sql_int};
use crate::types::SnapshotPage;

impl Db {
    /// Bulk-writes rows under a generation. Callers only write while the
    /// generation is `building`; readers never resolve such a generation.
    pub fn insert_ranking_rows(&mut self, generation_id: i64, rows: &[RankingRow]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO leaderboard_row (
                  period, generation_id, user_id, rank, total_tokens, total_cost, avg_cost,
                  event_count, streak_days, unique_tools, cache_efficiency
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;
            for row in rows {
                inserted += stmt.execute(params![
                    row.period.as_str(),
                    generation_id,
                    row.user_id,
                    row.rank,
                    sql_int(row.total_tokens),
                    row.total_cost,
                    row.avg_cost,
                    sql_int(row.event_count),
                    row.streak_days,
                    row.unique_tools,
                    row.cache_efficiency,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn ranking_rows(
        &self,
        generation_id: i64,
        filter: &RankingFilter,
        order: RankingOrder,
        page: PageRequest,
    ) -> Result<Vec<RankingRow>> {
        select_rows(&self.conn, generation_id, filter, order, page)
    }

    pub fn count_ranking_rows(&self, generation_id: i64, filter: &RankingFilter) -> Result<u64> {
        count_rows(&self.conn, generation_id, filter)
    }

    /// Resolves the generation once (the pinned one, or the period's current
    /// pointer) and reads the page and total count from it inside one read
    /// transaction. Returns `None` when the period has never been promoted.
    pub fn read_snapshot(
        &mut self,
        period: Period,
        pinned: Option<i64>,
        filter: &RankingFilter,
        order: RankingOrder,
        page: PageRequest,
    ) -> Result<Option<SnapshotPage>> {
        let tx = self.conn.transaction()?;
        let generation_id = match pinned {
            Some(id) => id,
            None => match current_pointer(&tx, period)? {
                Some(id) => id,
                None => return Ok(None),
            },
        };
        let generation = load_generation(&tx, generation_id)?
            .filter(|generation| {
                generation.period == period && generation.status == GenerationStatus::Complete
            })
            .ok_or(DbError::GenerationNotFound(generation_id))?;
        let rows = select_rows(&tx, generation_id, filter, order, page)?;
        let total_count = count_rows(&tx, generation_id, filter)?;
        tx.commit()?;
        Ok(Some(SnapshotPage {
            generation,
            rows,
            total_count,
        }))
    }

    /// The user's row in each period's current generation.
    pub fn user_standings(&mut self, user_id: &str) -> Result<Vec<RankingRow>> {
        let tx = self.conn.transaction()?;
        let rows = {
            let mut stmt = tx.prepare(
                r#"
                SELECT r.period, r.generation_id, r.user_id, r.rank, r.total_tokens,
                       r.total_cost, r.avg_cost, r.event_count, r.streak_days,
                       r.unique_tools, r.cache_efficiency
                FROM leaderboard_row r
                INNER JOIN leaderboard_current c
                  ON c.period = r.period AND c.generation_id = r.generation_id
                WHERE r.user_id = ?1
                ORDER BY CASE r.period WHEN 'all' THEN 0 WHEN 'month' THEN 1 ELSE 2 END
                "#,
            )?;
            let rows = stmt.query_map(params![user_id], row_to_ranking_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        tx.commit()?;
        Ok(rows)
    }
}

fn order_column(field: SortField) -> &'static str {
    match field {
        SortField::Rank => "rank",
        SortField::TotalTokens => "total_tokens",
        SortField::TotalCost => "total_cost",
        SortField::AvgCost => "avg_cost",
        SortField::StreakDays => "streak_days",
        SortField::UniqueTools => "unique_tools",
        SortField::CacheEfficiency => "cache_efficiency",
        SortField::UserId => "user_id",
    }
}

fn order_clause(order: RankingOrder) -> String {
    let direction = match order.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    if order.field == SortField::Rank {
        format!("rank {direction}")
    } else {
        format!("{} {direction}, rank ASC", order_column(order.field))
    }
}

/// Appends the filter's conditions to `generation_id = ?1` and collects the
/// bound values in placeholder order.
fn filter_clause(generation_id: i64, filter: &RankingFilter) -> (String, Vec<Value>) {
    let mut clause = String::from("generation_id = ?1");
    let mut values = vec![Value::Integer(generation_id)];
    let bounds = [
        ("rank >=", filter.min_rank.map(i64::from)),
        ("rank <=", filter.max_rank.map(i64::from)),
        ("total_tokens >=", filter.min_tokens.map(sql_int)),
        ("total_tokens <=", filter.max_tokens.map(sql_int)),
        ("streak_days >=", filter.min_streak.map(i64::from)),
        ("unique_tools >=", filter.min_tools.map(i64::from)),
    ];
    for (condition, bound) in bounds {
        if let Some(bound) = bound {
            values.push(Value::Integer(bound));
            clause.push_str(&format!(" AND {condition} ?{}", values.len()));
        }
    }
    if !filter.user_ids.is_empty() {
        let start = values.len() + 1;
        let placeholders: Vec<String> = (0..filter.user_ids.len())
            .map(|offset| format!("?{}", start + offset))
            .collect();
        values.extend(filter.user_ids.iter().cloned().map(Value::Text));
        clause.push_str(&format!(" AND user_id IN ({})", placeholders.join(", ")));
    }
    (clause, values)
}

fn select_rows(
    conn: &Connection,
    generation_id: i64,
    filter: &RankingFilter,
    order: RankingOrder,
    page: PageRequest,
) -> Result<Vec<RankingRow>> {
    let (clause, mut values) = filter_clause(generation_id, filter);
    let limit_index = values.len() + 1;
    values.push(Value::Integer(sql_int(page.limit)));
    values.push(Value::Integer(sql_int(page.offset)));
    let sql = format!(
        r#"
        SELECT {RANKING_COLUMNS}
        FROM leaderboard_row
        WHERE {clause}
        ORDER BY {}
        LIMIT ?{} OFFSET ?{}
        "#,
        order_clause(order),
        limit_index,
        limit_index + 1,
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), row_to_ranking_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

fn count_rows(conn: &Connection, generation_id: i64, filter: &RankingFilter) -> Result<u64> {
    let (clause, values) = filter_clause(generation_id, filter);
    let sql = format!("SELECT COUNT(*) FROM leaderboard_row WHERE {clause}");
    let count: i64 = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
    Ok(count.max(0) as u64)
}
