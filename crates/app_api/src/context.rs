use leaderboard_app::{AppState, RefreshScheduler};

#[derive(Clone)]
pub struct AppContext {
    pub app_state: AppState,
    pub scheduler: RefreshScheduler,
}
