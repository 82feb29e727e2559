use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::participant::{
        InviteView, JoinRequest, JoinResponse, JollyResponse, ParticipantSessionView,
        SubmitAnswerRequest, SubmitAnswerResponse,
    },
    error::AppError,
    routes::CallerId,
    services::{jolly, participant_service},
    state::SharedState,
};

/// Endpoints used by participants. The caller acts on its own behalf only.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/join/{quiz_id}", get(resolve_invite))
        .route("/quizzes/{quiz_id}/participants", post(join_session))
        .route(
            "/quizzes/{quiz_id}/participants/{id}",
            get(get_participant_view),
        )
        .route("/quizzes/{quiz_id}/answers", post(submit_answer))
        .route("/quizzes/{quiz_id}/jolly", post(activate_jolly))
}

/// Dereference an invite link.
#[utoipa::path(
    get,
    path = "/join/{quiz_id}",
    tag = "participants",
    params(("quiz_id" = String, Path, description = "Session to join")),
    responses(
        (status = 200, description = "Session summary", body = InviteView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn resolve_invite(
    State(state): State<SharedState>,
    Path(quiz_id): Path<String>,
) -> Result<Json<InviteView>, AppError> {
    Ok(Json(
        participant_service::resolve_invite(&state, &quiz_id).await?,
    ))
}

/// Join the lobby or a running session.
#[utoipa::path(
    post,
    path = "/quizzes/{quiz_id}/participants",
    tag = "participants",
    params(
        ("x-user-id" = String, Header, description = "Caller identity"),
        ("quiz_id" = String, Path, description = "Session to join")
    ),
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Participant record", body = JoinResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session already ended")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    CallerId(user_id): CallerId,
    Path(quiz_id): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<JoinResponse>, AppError> {
    Ok(Json(
        participant_service::join(&state, &quiz_id, &user_id, payload.email.as_deref()).await?,
    ))
}

/// The session as seen by the calling participant.
#[utoipa::path(
    get,
    path = "/quizzes/{quiz_id}/participants/{id}",
    tag = "participants",
    params(
        ("x-user-id" = String, Header, description = "Caller identity; must match `id`"),
        ("quiz_id" = String, Path, description = "Active session"),
        ("id" = String, Path, description = "Participant")
    ),
    responses(
        (status = 200, description = "Participant view", body = ParticipantSessionView),
        (status = 403, description = "Caller is another participant"),
        (status = 404, description = "Unknown session or participant")
    )
)]
pub async fn get_participant_view(
    State(state): State<SharedState>,
    CallerId(user_id): CallerId,
    Path((quiz_id, id)): Path<(String, String)>,
) -> Result<Json<ParticipantSessionView>, AppError> {
    if user_id != id {
        return Err(AppError::Forbidden(
            "participants may only read their own view".into(),
        ));
    }
    Ok(Json(
        participant_service::participant_view(&state, &quiz_id, &id).await?,
    ))
}

/// Answer the question currently open.
#[utoipa::path(
    post,
    path = "/quizzes/{quiz_id}/answers",
    tag = "participants",
    params(
        ("x-user-id" = String, Header, description = "Caller identity"),
        ("quiz_id" = String, Path, description = "Active session")
    ),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Submission outcome", body = SubmitAnswerResponse),
        (status = 403, description = "Caller has not joined"),
        (status = 404, description = "Unknown session or question")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    CallerId(user_id): CallerId,
    Path(quiz_id): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    Ok(Json(
        participant_service::submit_answer(&state, &quiz_id, &user_id, payload).await?,
    ))
}

/// Engage the caller's monthly bonus while the lobby is open.
#[utoipa::path(
    post,
    path = "/quizzes/{quiz_id}/jolly",
    tag = "participants",
    params(
        ("x-user-id" = String, Header, description = "Caller identity"),
        ("quiz_id" = String, Path, description = "Active session")
    ),
    responses((status = 200, description = "Activation outcome", body = JollyResponse))
)]
pub async fn activate_jolly(
    State(state): State<SharedState>,
    CallerId(user_id): CallerId,
    Path(quiz_id): Path<String>,
) -> Result<Json<JollyResponse>, AppError> {
    Ok(Json(jolly::activate(&state, &quiz_id, &user_id).await?))
}
