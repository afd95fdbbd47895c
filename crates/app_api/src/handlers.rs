use std::str::FromStr;

use leaderboard_app::{AppError, LeaderboardQuery, PageSpec, Result};
use leaderboard_core::{Period, RankingFilter, RankingOrder, SortDirection, SortField};

use crate::{
    AppContext, GenerationsRequest, GenerationsResponse, LeaderboardRequest, LeaderboardResponse,
    RefreshRequest, RefreshResponse, RefreshStatusResponse, StandingsRequest, StandingsResponse,
};

const DEFAULT_PERIOD: &str = "all";

fn parse_field<T: FromStr>(name: &str, value: Option<&str>) -> Result<Option<T>> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::InvalidInput(format!("invalid {}: {}", name, raw))),
    }
}

fn parse_users(users: Option<&str>) -> Vec<String> {
    users
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_order(order_by: Option<&str>, direction: Option<&str>) -> Result<RankingOrder> {
    let field = match order_by.map(str::trim).filter(|value| !value.is_empty()) {
        None => SortField::Rank,
        Some(value) => SortField::parse(value)
            .ok_or_else(|| AppError::InvalidInput(format!("unsupported order_by {}", value)))?,
    };
    let direction = match direction.map(str::trim).filter(|value| !value.is_empty()) {
        // Rank and user id read naturally ascending; metrics read best-first.
        None => match field {
            SortField::Rank | SortField::UserId => SortDirection::Asc,
            _ => SortDirection::Desc,
        },
        Some(value) => SortDirection::parse(value)
            .ok_or_else(|| AppError::InvalidInput(format!("unsupported direction {}", value)))?,
    };
    Ok(RankingOrder { field, direction })
}

fn parse_page(req: &LeaderboardRequest) -> Result<PageSpec> {
    let page = parse_field::<u64>("page", req.page.as_deref())?;
    let page_size = parse_field::<u64>("page_size", req.page_size.as_deref())?;
    let offset = parse_field::<u64>("offset", req.offset.as_deref())?;
    let limit = parse_field::<u64>("limit", req.limit.as_deref())?;
    if offset.is_some() && (page.is_some() || page_size.is_some()) {
        return Err(AppError::InvalidInput(
            "use either page/page_size or offset/limit".to_string(),
        ));
    }
    Ok(match (offset, page) {
        (Some(offset), _) => PageSpec::Offset { offset, limit },
        (None, page) => PageSpec::Number {
            page: page.unwrap_or(1),
            page_size: page_size.or(limit),
        },
    })
}

fn leaderboard_query(req: &LeaderboardRequest) -> Result<LeaderboardQuery> {
    let filter = RankingFilter {
        user_ids: parse_users(req.users.as_deref()),
        min_rank: parse_field("min_rank", req.min_rank.as_deref())?,
        max_rank: parse_field("max_rank", req.max_rank.as_deref())?,
        min_tokens: parse_field("min_tokens", req.min_tokens.as_deref())?,
        max_tokens: parse_field("max_tokens", req.max_tokens.as_deref())?,
        min_streak: parse_field("min_streak", req.min_streak.as_deref())?,
        min_tools: parse_field("min_tools", req.min_tools.as_deref())?,
    };
    Ok(LeaderboardQuery {
        filter,
        order: parse_order(req.order_by.as_deref(), req.direction.as_deref())?,
        page: parse_page(req)?,
        generation: parse_field("generation", req.generation.as_deref())?,
    })
}

pub fn leaderboard(ctx: &AppContext, req: LeaderboardRequest) -> Result<LeaderboardResponse> {
    let query = leaderboard_query(&req)?;
    let period = req.period.as_deref().unwrap_or(DEFAULT_PERIOD);
    let page = ctx.app_state.services.leaderboard.query(period, &query)?;
    Ok(LeaderboardResponse {
        period: page.period,
        entries: page.entries,
        pagination: page.pagination,
        generation_id: page.generation_id,
        computed_at: page.computed_at,
    })
}

pub fn standings(ctx: &AppContext, req: StandingsRequest) -> Result<StandingsResponse> {
    let user_id = req.user_id.unwrap_or_default();
    let standings = ctx.app_state.services.leaderboard.standings(&user_id)?;
    Ok(StandingsResponse {
        user_id: user_id.trim().to_string(),
        standings,
    })
}

pub fn generations(ctx: &AppContext, req: GenerationsRequest) -> Result<GenerationsResponse> {
    let period: Period = req.period.as_deref().unwrap_or(DEFAULT_PERIOD).parse()?;
    let limit = parse_field("limit", req.limit.as_deref())?;
    let generations = ctx
        .app_state
        .services
        .leaderboard
        .generations(period.as_str(), limit)?;
    Ok(GenerationsResponse {
        period,
        generations,
    })
}

/// Starts a guarded refresh. Must run inside the server's Tokio runtime.
pub fn refresh(ctx: &AppContext, req: RefreshRequest) -> Result<RefreshResponse> {
    let period: Period = req.period.parse()?;
    let outcome = ctx.scheduler.trigger(period);
    Ok(RefreshResponse { period, outcome })
}

pub fn refresh_status(ctx: &AppContext) -> Result<RefreshStatusResponse> {
    Ok(RefreshStatusResponse {
        periods: ctx.scheduler.statuses(),
        events: ctx.scheduler.events(),
    })
}
