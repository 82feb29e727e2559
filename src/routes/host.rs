use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        host::{
            ActionResponse, DraftView, HostSessionView, RenameDraftRequest, ScoreOverrideRequest,
            ScoreOverrideResponse,
        },
        participant::JollyResponse,
        public::{ClearLeaderboardResponse, SettingsView, UpdateSettingsRequest},
        quiz::{QuestionInput, QuestionView},
    },
    error::AppError,
    routes::{require_host_mutator, require_host_viewer},
    services::{
        access::HostIdentity, authoring_service, jolly, leaderboard_service, session_service,
        settings_service,
    },
    state::SharedState,
};

/// Host console endpoints. Everything but the session view requires the full host role.
pub fn router(state: SharedState) -> Router<SharedState> {
    let mutating = Router::new()
        .route("/host/draft", get(get_draft))
        .route("/host/draft/name", put(rename_draft))
        .route("/host/draft/questions", post(add_question))
        .route("/host/draft/questions/{id}", delete(delete_question))
        .route("/host/session/publish", post(publish_session))
        .route("/host/session/begin", post(begin_session))
        .route("/host/session/reveal", post(reveal_answer))
        .route("/host/session/advance", post(advance_session))
        .route("/host/session/restart", post(restart_session))
        .route("/host/session/reset", post(reset_session))
        .route(
            "/host/answers/{question_id}/{participant_id}/score",
            put(override_score),
        )
        .route("/host/participants/{id}/jolly", post(activate_jolly))
        .route("/host/leaderboard", delete(clear_leaderboard))
        .route("/host/settings", put(update_settings))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_host_mutator,
        ));

    let viewing = Router::new()
        .route("/host/session", get(get_session))
        .route_layer(middleware::from_fn_with_state(state, require_host_viewer));

    mutating.merge(viewing)
}

/// Read the draft being authored.
#[utoipa::path(
    get,
    path = "/host/draft",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    responses((status = 200, description = "Current draft", body = DraftView))
)]
pub async fn get_draft(State(state): State<SharedState>) -> Json<DraftView> {
    Json(authoring_service::get_draft(&state).await)
}

/// Rename the draft.
#[utoipa::path(
    put,
    path = "/host/draft/name",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    request_body = RenameDraftRequest,
    responses(
        (status = 200, description = "Renamed draft", body = DraftView),
        (status = 400, description = "Invalid name")
    )
)]
pub async fn rename_draft(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RenameDraftRequest>>,
) -> Json<DraftView> {
    Json(authoring_service::rename_draft(&state, &payload.name).await)
}

/// Append a validated question to the draft.
#[utoipa::path(
    post,
    path = "/host/draft/questions",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    request_body = QuestionInput,
    responses(
        (status = 200, description = "Question added", body = QuestionView),
        (status = 400, description = "Invalid question")
    )
)]
pub async fn add_question(
    State(state): State<SharedState>,
    Json(payload): Json<QuestionInput>,
) -> Result<Json<QuestionView>, AppError> {
    Ok(Json(authoring_service::add_question(&state, payload).await?))
}

/// Remove a question from the draft.
#[utoipa::path(
    delete,
    path = "/host/draft/questions/{id}",
    tag = "host",
    params(
        ("x-user-id" = String, Header, description = "Host identity"),
        ("id" = String, Path, description = "Question to remove")
    ),
    responses(
        (status = 204, description = "Question removed"),
        (status = 404, description = "Unknown question")
    )
)]
pub async fn delete_question(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    authoring_service::delete_question(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Publish the draft and open the lobby.
#[utoipa::path(
    post,
    path = "/host/session/publish",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    responses((status = 200, description = "Publish outcome", body = ActionResponse))
)]
pub async fn publish_session(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(session_service::publish(&state, &host).await?))
}

/// Close the lobby and open the first question.
#[utoipa::path(
    post,
    path = "/host/session/begin",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    responses((status = 200, description = "Begin outcome", body = ActionResponse))
)]
pub async fn begin_session(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(session_service::begin(&state).await?))
}

/// Reveal the correct answer of the current question.
#[utoipa::path(
    post,
    path = "/host/session/reveal",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    responses((status = 200, description = "Reveal outcome", body = ActionResponse))
)]
pub async fn reveal_answer(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(session_service::reveal(&state).await?))
}

/// Settle the current question, then open the next one or end the session.
#[utoipa::path(
    post,
    path = "/host/session/advance",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    responses((status = 200, description = "Advance outcome", body = ActionResponse))
)]
pub async fn advance_session(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(session_service::advance(&state).await?))
}

/// Replay an ended session from its first question.
#[utoipa::path(
    post,
    path = "/host/session/restart",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    responses((status = 200, description = "Restart outcome", body = ActionResponse))
)]
pub async fn restart_session(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(session_service::restart(&state).await?))
}

/// Discard the session and go back to authoring.
#[utoipa::path(
    post,
    path = "/host/session/reset",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    responses((status = 200, description = "Reset outcome", body = ActionResponse))
)]
pub async fn reset_session(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(session_service::reset(&state).await?))
}

/// Session, participants, answers and oracle annotations as the host sees them.
#[utoipa::path(
    get,
    path = "/host/session",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host or co-host identity")),
    responses(
        (status = 200, description = "Host view", body = HostSessionView),
        (status = 404, description = "No active session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
) -> Result<Json<HostSessionView>, AppError> {
    Ok(Json(session_service::host_view(&state).await?))
}

/// Manually score an answer before its question is settled.
#[utoipa::path(
    put,
    path = "/host/answers/{question_id}/{participant_id}/score",
    tag = "host",
    params(
        ("x-user-id" = String, Header, description = "Host identity"),
        ("question_id" = String, Path, description = "Question answered"),
        ("participant_id" = String, Path, description = "Author of the answer")
    ),
    request_body = ScoreOverrideRequest,
    responses(
        (status = 200, description = "Override outcome", body = ScoreOverrideResponse),
        (status = 404, description = "Unknown question or answer")
    )
)]
pub async fn override_score(
    State(state): State<SharedState>,
    Path((question_id, participant_id)): Path<(String, String)>,
    Json(payload): Json<ScoreOverrideRequest>,
) -> Result<Json<ScoreOverrideResponse>, AppError> {
    Ok(Json(
        session_service::override_score(&state, question_id, participant_id, &payload.score)
            .await?,
    ))
}

/// Engage the monthly bonus for a participant.
#[utoipa::path(
    post,
    path = "/host/participants/{id}/jolly",
    tag = "host",
    params(
        ("x-user-id" = String, Header, description = "Host identity"),
        ("id" = String, Path, description = "Participant")
    ),
    responses((status = 200, description = "Activation outcome", body = JollyResponse))
)]
pub async fn activate_jolly(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<JollyResponse>, AppError> {
    Ok(Json(jolly::activate_in_active_session(&state, &id).await?))
}

/// Wipe the current month of the leaderboard.
#[utoipa::path(
    delete,
    path = "/host/leaderboard",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    responses((status = 200, description = "Entries removed", body = ClearLeaderboardResponse))
)]
pub async fn clear_leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<ClearLeaderboardResponse>, AppError> {
    Ok(Json(leaderboard_service::clear_current_month(&state).await?))
}

/// Edit the rules text or toggle the bonus.
#[utoipa::path(
    put,
    path = "/host/settings",
    tag = "host",
    params(("x-user-id" = String, Header, description = "Host identity")),
    request_body = UpdateSettingsRequest,
    responses((status = 200, description = "Updated settings", body = SettingsView))
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<UpdateSettingsRequest>>,
) -> Result<Json<SettingsView>, AppError> {
    Ok(Json(settings_service::update_settings(&state, payload).await?))
}
