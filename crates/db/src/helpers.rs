use chrono::{DateTime, SecondsFormat, Utc};
use leaderboard_core::{Generation, GenerationStatus, Period, RankingRow, UsageEvent};
use rusqlite::Row;
use rusqlite::types::Type;

/// Fixed-width UTC timestamps so text comparison matches time order.
pub fn format_ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

/// SQLite integers are signed; values past `i64::MAX` clamp instead of wrapping.
pub(crate) fn sql_int<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

fn conversion_error(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn ts_column(row: &Row<'_>, index: usize) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    let value: String = row.get(index)?;
    parse_ts(&value).map_err(|err| conversion_error(index, err))
}

fn opt_ts_column(
    row: &Row<'_>,
    index: usize,
) -> std::result::Result<Option<DateTime<Utc>>, rusqlite::Error> {
    match row.get::<_, Option<String>>(index)? {
        Some(value) => parse_ts(&value)
            .map(Some)
            .map_err(|err| conversion_error(index, err)),
        None => Ok(None),
    }
}

fn period_column(row: &Row<'_>, index: usize) -> std::result::Result<Period, rusqlite::Error> {
    let value: String = row.get(index)?;
    value
        .parse::<Period>()
        .map_err(|err| conversion_error(index, err))
}

pub(crate) fn row_to_usage_event(
    row: &Row<'_>,
) -> std::result::Result<UsageEvent, rusqlite::Error> {
    Ok(UsageEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        tokens: row.get::<_, i64>(2)?.max(0) as u64,
        cached_tokens: row.get::<_, i64>(3)?.max(0) as u64,
        cost: row.get(4)?,
        tool: row.get(5)?,
        occurred_at: ts_column(row, 6)?,
    })
}

pub(crate) const GENERATION_COLUMNS: &str = r#"
    g.id, g.period, g.status, g.as_of, g.started_at, g.completed_at, g.row_count, g.error,
    c.generation_id IS NOT NULL AS is_current
"#;

pub(crate) fn row_to_generation(
    row: &Row<'_>,
) -> std::result::Result<Generation, rusqlite::Error> {
    let status: String = row.get(2)?;
    let status = GenerationStatus::parse(&status).ok_or_else(|| {
        conversion_error(
            2,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown generation status {status}"),
            ),
        )
    })?;
    Ok(Generation {
        id: row.get(0)?,
        period: period_column(row, 1)?,
        status,
        as_of: ts_column(row, 3)?,
        started_at: ts_column(row, 4)?,
        completed_at: opt_ts_column(row, 5)?,
        row_count: row.get::<_, i64>(6)?.max(0) as u64,
        error: row.get(7)?,
        current: row.get(8)?,
    })
}

pub(crate) const RANKING_COLUMNS: &str = r#"
    period, generation_id, user_id, rank, total_tokens, total_cost, avg_cost,
    event_count, streak_days, unique_tools, cache_efficiency
"#;

pub(crate) fn row_to_ranking_row(
    row: &Row<'_>,
) -> std::result::Result<RankingRow, rusqlite::Error> {
    Ok(RankingRow {
        period: period_column(row, 0)?,
        generation_id: row.get(1)?,
        user_id: row.get(2)?,
        rank: row.get(3)?,
        total_tokens: row.get::<_, i64>(4)?.max(0) as u64,
        total_cost: row.get(5)?,
        avg_cost: row.get(6)?,
        event_count: row.get::<_, i64>(7)?.max(0) as u64,
        streak_days: row.get(8)?,
        unique_tools: row.get(9)?,
        cache_efficiency: row.get(10)?,
    })
}
