use utoipa::OpenApi;

/// OpenAPI document covering every REST and SSE route.
#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::host_stream,
        crate::routes::host::get_draft,
        crate::routes::host::rename_draft,
        crate::routes::host::add_question,
        crate::routes::host::delete_question,
        crate::routes::host::publish_session,
        crate::routes::host::begin_session,
        crate::routes::host::reveal_answer,
        crate::routes::host::advance_session,
        crate::routes::host::restart_session,
        crate::routes::host::reset_session,
        crate::routes::host::get_session,
        crate::routes::host::override_score,
        crate::routes::host::activate_jolly,
        crate::routes::host::clear_leaderboard,
        crate::routes::host::update_settings,
        crate::routes::participant::resolve_invite,
        crate::routes::participant::join_session,
        crate::routes::participant::get_participant_view,
        crate::routes::participant::submit_answer,
        crate::routes::participant::activate_jolly,
        crate::routes::public::get_leaderboard,
        crate::routes::public::get_settings,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::phase::VisiblePhase,
            crate::dto::quiz::QuestionType,
            crate::dto::quiz::AnswerType,
            crate::dto::quiz::QuestionInput,
            crate::dto::quiz::QuestionView,
            crate::dto::quiz::ParticipantQuestionView,
            crate::dto::host::DraftView,
            crate::dto::host::RenameDraftRequest,
            crate::dto::host::ActionResponse,
            crate::dto::host::AnswerView,
            crate::dto::host::HostSessionView,
            crate::dto::host::ScoreOverrideRequest,
            crate::dto::host::ScoreOverrideResponse,
            crate::dto::participant::InviteView,
            crate::dto::participant::JoinRequest,
            crate::dto::participant::ParticipantView,
            crate::dto::participant::JoinResponse,
            crate::dto::participant::ParticipantSessionView,
            crate::dto::participant::OwnAnswerView,
            crate::dto::participant::SubmitAnswerRequest,
            crate::dto::participant::SubmitAnswerResponse,
            crate::dto::participant::JollyResponse,
            crate::dto::public::LeaderboardEntryView,
            crate::dto::public::LeaderboardResponse,
            crate::dto::public::ClearLeaderboardResponse,
            crate::dto::public::SettingsView,
            crate::dto::public::UpdateSettingsRequest,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::ParticipantJoinedEvent,
            crate::dto::sse::ScoresSettledEvent,
            crate::dto::sse::SessionDeletedEvent,
            crate::dto::sse::JollyActivatedEvent,
            crate::dto::sse::LeaderboardClearedEvent,
            crate::dto::sse::AnswerReceivedEvent,
            crate::dto::sse::AnswerAnnotatedEvent,
            crate::dto::sse::AnswerScoredEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "host", description = "Authoring and session control for hosts"),
        (name = "participants", description = "Joining, answering and bonus activation"),
        (name = "public", description = "Leaderboard and rules"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/healthcheck",
            "/sse/host",
            "/host/session/advance",
            "/host/answers/{question_id}/{participant_id}/score",
            "/quizzes/{quiz_id}/answers",
            "/leaderboard",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
