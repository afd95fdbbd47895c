use axum::{
    extract::{Json, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use app_api::{GenerationsRequest, LeaderboardRequest, RefreshRequest, StandingsRequest};

use crate::{errors::HttpError, state::HttpState};

pub async fn leaderboard(
    State(state): State<HttpState>,
    Query(req): Query<LeaderboardRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let response = app_api::leaderboard(&state.context, req)?;
    Ok(Json(response))
}

pub async fn standings(
    State(state): State<HttpState>,
    Query(req): Query<StandingsRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let response = app_api::standings(&state.context, req)?;
    Ok(Json(response))
}

pub async fn generations(
    State(state): State<HttpState>,
    Query(req): Query<GenerationsRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let response = app_api::generations(&state.context, req)?;
    Ok(Json(response))
}

pub async fn refresh(
    State(state): State<HttpState>,
    req: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Json(req) = req.map_err(|rejection| {
        HttpError::new(
            StatusCode::BAD_REQUEST,
            rejection.body_text(),
            Some("invalid_input".to_string()),
        )
    })?;
    let response = app_api::refresh(&state.context, req)?;
    Ok(Json(response))
}

pub async fn refresh_status(
    State(state): State<HttpState>,
) -> Result<impl IntoResponse, HttpError> {
    let response = app_api::refresh_status(&state.context)?;
    Ok(Json(response))
}

pub async fn not_found() -> HttpError {
    HttpError::new(
        StatusCode::NOT_FOUND,
        "no such route",
        Some("not_found".to_string()),
    )
}
