use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{Period, RankingRow, UsageEvent};

/// Largest token total a ranking row can carry; SQLite integers are signed.
pub const MAX_TOTAL_TOKENS: u64 = i64::MAX as u64;

#[derive(Debug, Default)]
struct UserTotals {
    tokens: u64,
    cached_tokens: u64,
    cost: f64,
    events: u64,
    tools: BTreeSet<String>,
    active_days: BTreeSet<NaiveDate>,
}

/// Folds a stream of usage events into one ranking row per user.
///
/// Memory is bounded by the number of users (and their active days), not by
/// the number of events, so the ledger can be scanned page by page.
#[derive(Debug, Default)]
pub struct RankingAccumulator {
    users: HashMap<String, UserTotals>,
    events: u64,
}

impl RankingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &UsageEvent) {
        let totals = self.users.entry(event.user_id.clone()).or_default();
        totals.tokens = totals
            .tokens
            .saturating_add(event.tokens)
            .min(MAX_TOTAL_TOKENS);
        totals.cached_tokens = totals
            .cached_tokens
            .saturating_add(event.cached_tokens.min(event.tokens))
            .min(MAX_TOTAL_TOKENS);
        totals.cost += event.cost;
        totals.events += 1;
        if !totals.tools.contains(&event.tool) {
            totals.tools.insert(event.tool.clone());
        }
        totals.active_days.insert(event.occurred_at.date_naive());
        self.events += 1;
    }

    pub fn event_count(&self) -> u64 {
        self.events
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn finish(
        self,
        period: Period,
        generation_id: i64,
        as_of: DateTime<Utc>,
    ) -> Vec<RankingRow> {
        let as_of_day = as_of.date_naive();
        let mut rows: Vec<RankingRow> = self
            .users
            .into_iter()
            .map(|(user_id, totals)| RankingRow {
                period,
                generation_id,
                rank: 0,
                total_tokens: totals.tokens,
                total_cost: totals.cost,
                avg_cost: if totals.events == 0 {
                    0.0
                } else {
                    totals.cost / totals.events as f64
                },
                event_count: totals.events,
                streak_days: streak_ending_at(&totals.active_days, as_of_day),
                unique_tools: totals.tools.len() as u32,
                cache_efficiency: if totals.tokens == 0 {
                    0.0
                } else {
                    (totals.cached_tokens as f64 / totals.tokens as f64) * 100.0
                },
                user_id,
            })
            .collect();
        assign_ranks(&mut rows);
        rows
    }
}

/// Sorts by tokens descending, user id ascending, and numbers rows 1..N.
pub fn assign_ranks(rows: &mut [RankingRow]) {
    rows.sort_by(|a, b| {
        b.total_tokens
            .cmp(&a.total_tokens)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index as u32 + 1;
    }
}

/// Consecutive active days ending on `as_of`, or on the day before when
/// `as_of` itself has no activity yet.
pub fn streak_ending_at(days: &BTreeSet<NaiveDate>, as_of: NaiveDate) -> u32 {
    let mut cursor = if days.contains(&as_of) {
        as_of
    } else {
        let yesterday = as_of - Duration::days(1);
        if !days.contains(&yesterday) {
            return 0;
        }
        yesterday
    };
    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}
