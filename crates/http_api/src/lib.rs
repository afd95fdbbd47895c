mod errors;
mod handlers;
mod state;

use axum::{
    Router,
    routing::{get, post},
};

pub use errors::HttpError;
pub use state::HttpState;

pub fn router(state: HttpState) -> Router<()> {
    let api = Router::new()
        .route("/leaderboard", get(handlers::leaderboard))
        .route("/leaderboard/standings", get(handlers::standings))
        .route("/leaderboard/generations", get(handlers::generations))
        .route("/refresh", post(handlers::refresh))
        .route("/refresh/status", get(handlers::refresh_status));

    Router::new()
        .nest("/api", api)
        .fallback(handlers::not_found)
        .with_state(state)
}
