use serde::Serialize;
use tracing::warn;

use crate::{
    dao::{models::ParticipantEntity, quiz_store::AnswerKey},
    dto::{
        format_system_time,
        participant::ParticipantView,
        sse::{
            AnswerAnnotatedEvent, AnswerReceivedEvent, AnswerScoredEvent, JollyActivatedEvent,
            LeaderboardClearedEvent, ParticipantJoinedEvent, PhaseChangedEvent,
            ScoresSettledEvent, ServerEvent, SessionDeletedEvent, SystemStatus,
        },
    },
    oracle::CheatVerdict,
    state::{SharedState, state_machine::QuizPhase},
};

/// Session phase moved.
pub const EVENT_PHASE_CHANGED: &str = "phase_changed";
/// A participant joined.
pub const EVENT_PARTICIPANT_JOINED: &str = "participant.joined";
/// Question totals committed.
pub const EVENT_SCORES_SETTLED: &str = "scores.settled";
/// Active session discarded.
pub const EVENT_SESSION_DELETED: &str = "session.deleted";
/// A participant engaged the bonus.
pub const EVENT_JOLLY_ACTIVATED: &str = "jolly.activated";
/// Monthly leaderboard wiped.
pub const EVENT_LEADERBOARD_CLEARED: &str = "leaderboard.cleared";
/// Degraded mode toggled.
pub const EVENT_SYSTEM_STATUS: &str = "system.status";
/// Answer stored (host only).
pub const EVENT_ANSWER_RECEIVED: &str = "answer.received";
/// Oracle verdict stored (host only).
pub const EVENT_ANSWER_ANNOTATED: &str = "answer.annotated";
/// Answer flagged as suspicious (host only).
pub const EVENT_CHEAT_WARNING: &str = "cheat.warning";
/// Manual score override (host only).
pub const EVENT_ANSWER_SCORED: &str = "answer.scored";

/// Broadcast a session phase change notification.
pub async fn broadcast_phase_changed(state: &SharedState, phase: QuizPhase) {
    let payload = state
        .read_current_quiz(|quiz| {
            let current = quiz
                .filter(|_| phase.has_current_question())
                .and_then(|quiz| quiz.current_question().map(|q| (quiz, q)));

            PhaseChangedEvent {
                phase: phase.into(),
                quiz_id: quiz
                    .filter(|_| phase != QuizPhase::Authoring)
                    .map(|quiz| quiz.id.clone()),
                question_id: current.map(|(_, q)| q.id.clone()),
                question_index: current.map(|(quiz, _)| quiz.current_question_index),
                question_started_at: current
                    .and_then(|(quiz, _)| quiz.question_started_at)
                    .map(format_system_time),
            }
        })
        .await;

    send_public_event(state, EVENT_PHASE_CHANGED, &payload);
    send_host_event(state, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast a newly joined participant.
pub fn broadcast_participant_joined(state: &SharedState, participant: ParticipantEntity) {
    let payload = ParticipantJoinedEvent {
        quiz_id: participant.quiz_id.clone(),
        participant: participant.into(),
    };
    send_public_event(state, EVENT_PARTICIPANT_JOINED, &payload);
    send_host_event(state, EVENT_PARTICIPANT_JOINED, &payload);
}

/// Broadcast committed totals after a question was settled.
pub fn broadcast_scores_settled(
    state: &SharedState,
    quiz_id: &str,
    question_id: &str,
    mut participants: Vec<ParticipantEntity>,
) {
    participants.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    let payload = ScoresSettledEvent {
        quiz_id: quiz_id.to_owned(),
        question_id: question_id.to_owned(),
        standings: participants.into_iter().map(ParticipantView::from).collect(),
    };
    send_public_event(state, EVENT_SCORES_SETTLED, &payload);
    send_host_event(state, EVENT_SCORES_SETTLED, &payload);
}

/// Tell every client that the session document is gone.
pub fn broadcast_session_deleted(state: &SharedState, quiz_id: &str) {
    let payload = SessionDeletedEvent {
        quiz_id: quiz_id.to_owned(),
    };
    send_public_event(state, EVENT_SESSION_DELETED, &payload);
    send_host_event(state, EVENT_SESSION_DELETED, &payload);
}

/// Broadcast that a participant engaged the bonus.
pub fn broadcast_jolly_activated(state: &SharedState, quiz_id: &str, participant_id: &str) {
    let payload = JollyActivatedEvent {
        quiz_id: quiz_id.to_owned(),
        participant_id: participant_id.to_owned(),
    };
    send_public_event(state, EVENT_JOLLY_ACTIVATED, &payload);
    send_host_event(state, EVENT_JOLLY_ACTIVATED, &payload);
}

/// Broadcast a monthly leaderboard reset.
pub fn broadcast_leaderboard_cleared(state: &SharedState, month: &str, removed: u64) {
    let payload = LeaderboardClearedEvent {
        month: month.to_owned(),
        removed,
    };
    send_public_event(state, EVENT_LEADERBOARD_CLEARED, &payload);
    send_host_event(state, EVENT_LEADERBOARD_CLEARED, &payload);
}

/// Broadcast the degraded flag on both streams.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_host_event(state, EVENT_SYSTEM_STATUS, &payload);
}

/// Notify the host that an answer was stored.
pub fn broadcast_answer_received(state: &SharedState, key: &AnswerKey) {
    let payload = AnswerReceivedEvent {
        quiz_id: key.quiz_id.clone(),
        question_id: key.question_id.clone(),
        participant_id: key.participant_id.clone(),
    };
    send_host_event(state, EVENT_ANSWER_RECEIVED, &payload);
}

/// Forward an oracle verdict to the host; flagged answers also raise a warning.
pub fn broadcast_answer_annotated(state: &SharedState, key: &AnswerKey, verdict: &CheatVerdict) {
    let payload = AnswerAnnotatedEvent {
        quiz_id: key.quiz_id.clone(),
        question_id: key.question_id.clone(),
        participant_id: key.participant_id.clone(),
        is_cheating: verdict.is_cheating,
        reason: verdict.reason.clone(),
    };
    send_host_event(state, EVENT_ANSWER_ANNOTATED, &payload);
    if verdict.is_cheating {
        send_host_event(state, EVENT_CHEAT_WARNING, &payload);
    }
}

/// Notify the host of a manual score change.
pub fn broadcast_answer_scored(state: &SharedState, key: &AnswerKey, score: i64) {
    let payload = AnswerScoredEvent {
        quiz_id: key.quiz_id.clone(),
        question_id: key.question_id.clone(),
        participant_id: key.participant_id.clone(),
        score,
    };
    send_host_event(state, EVENT_ANSWER_SCORED, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

fn send_host_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.host_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize host SSE payload"),
    }
}
