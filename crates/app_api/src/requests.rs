use serde::Deserialize;

/// Query string of `GET /api/leaderboard`. Numbers arrive as text so a bad
/// value surfaces as `invalid_input` instead of a transport rejection.
#[derive(Debug, Deserialize, Default)]
pub struct LeaderboardRequest {
    pub period: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub order_by: Option<String>,
    pub direction: Option<String>,
    /// Comma-separated user ids.
    pub users: Option<String>,
    pub min_rank: Option<String>,
    pub max_rank: Option<String>,
    pub min_tokens: Option<String>,
    pub max_tokens: Option<String>,
    pub min_streak: Option<String>,
    pub min_tools: Option<String>,
    pub generation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StandingsRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerationsRequest {
    pub period: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub period: String,
}
