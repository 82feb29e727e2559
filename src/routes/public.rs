use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::public::{LeaderboardResponse, SettingsView},
    error::AppError,
    services::{leaderboard_service, settings_service},
    state::SharedState,
};

/// Public read-only endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/leaderboard", get(get_leaderboard))
        .route("/settings", get(get_settings))
}

#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "public",
    responses(
        (status = 200, description = "Ranked leaderboard of the current month", body = LeaderboardResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Ranked monthly leaderboard.
pub async fn get_leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(leaderboard_service::monthly_leaderboard(&state).await?))
}

#[utoipa::path(
    get,
    path = "/settings",
    tag = "public",
    responses((status = 200, description = "Rules and bonus settings", body = SettingsView))
)]
/// Rules text and bonus switch.
pub async fn get_settings(
    State(state): State<SharedState>,
) -> Result<Json<SettingsView>, AppError> {
    Ok(Json(settings_service::get_settings(&state).await?))
}
