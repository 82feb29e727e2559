//! Monthly bonus token ("jolly"): eligibility and activation.

use std::time::SystemTime;

use tracing::{debug, info};

use crate::{
    dao::quiz_store::QuizStore,
    dto::participant::JollyResponse,
    error::ServiceError,
    services::{scoring, sse_events},
    state::{SharedState, state_machine::QuizPhase},
};

/// Whether `user_id` may use the bonus this month, ignoring the session phase.
pub async fn is_eligible(store: &dyn QuizStore, user_id: &str) -> Result<bool, ServiceError> {
    let Some(profile) = store.find_profile(user_id.to_owned()).await? else {
        return Ok(false);
    };
    let month = scoring::month_key(SystemTime::now());
    if !profile.jolly_available_in(&month) {
        return Ok(false);
    }
    let settings = store.find_settings().await?;
    Ok(scoring::is_jolly_eligible(
        settings.jolly_enabled,
        profile.quizzes_played_in(&month),
        settings.quizzes_held_in(&month),
    ))
}

/// Engage the bonus of `participant_id` in the active session.
///
/// Only possible in the lobby, once, and for eligible users; anything else is a no-op.
pub async fn activate(
    state: &SharedState,
    quiz_id: &str,
    participant_id: &str,
) -> Result<JollyResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let is_active_session = state
        .read_current_quiz(|quiz| quiz.is_some_and(|quiz| quiz.id == quiz_id))
        .await;
    if !is_active_session {
        return Err(ServiceError::NotFound(format!("quiz `{quiz_id}` not found")));
    }

    let participant = store
        .find_participant(quiz_id.to_owned(), participant_id.to_owned())
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("participant `{participant_id}` has not joined"))
        })?;
    let noop = JollyResponse {
        applied: false,
        jolly_active: participant.jolly_active,
    };

    // Holding the gate keeps the lobby from closing underneath the activation.
    let Some(_gate) = state.try_enter_transition() else {
        return Ok(noop);
    };
    if state.phase().await != QuizPhase::Lobby {
        debug!(quiz_id, participant_id, "jolly ignored outside the lobby");
        return Ok(noop);
    }
    if participant.jolly_active || !is_eligible(store.as_ref(), participant_id).await? {
        debug!(quiz_id, participant_id, "jolly ignored; participant not eligible");
        return Ok(noop);
    }

    let month = scoring::month_key(SystemTime::now());
    let applied = store
        .activate_jolly(quiz_id.to_owned(), participant_id.to_owned(), month)
        .await?;
    if applied {
        info!(quiz_id, participant_id, "jolly activated");
        sse_events::broadcast_jolly_activated(state, quiz_id, participant_id);
    }

    Ok(JollyResponse {
        applied,
        jolly_active: applied || participant.jolly_active,
    })
}

/// Engage the bonus of `participant_id` on behalf of the host, in whichever session is active.
pub async fn activate_in_active_session(
    state: &SharedState,
    participant_id: &str,
) -> Result<JollyResponse, ServiceError> {
    let quiz_id = state
        .read_current_quiz(|quiz| quiz.map(|quiz| quiz.id.clone()))
        .await
        .ok_or(ServiceError::NoSession)?;
    activate(state, &quiz_id, participant_id).await
}
