use std::time::SystemTime;

use rand::Rng;
use tracing::{debug, info};

use crate::{
    dao::{
        models::{AnswerEntity, ParticipantEntity, ProfileEntity},
        quiz_store::AnswerKey,
    },
    dto::{
        format_system_time,
        participant::{
            InviteView, JoinResponse, OwnAnswerView, ParticipantSessionView, SubmitAnswerRequest,
            SubmitAnswerResponse,
        },
        quiz::ParticipantQuestionView,
    },
    error::ServiceError,
    services::{jolly, scoring, sse_events},
    state::{SharedState, quiz::QuizSession, state_machine::QuizPhase},
};

/// Display name given to participants without a profile or e-mail.
pub const FALLBACK_NAME: &str = "Giocatore Misterioso";

/// Name derived from the e-mail prefix, or [`FALLBACK_NAME`].
pub fn fallback_name(email: Option<&str>) -> String {
    email
        .and_then(|email| email.split('@').next())
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| FALLBACK_NAME.to_owned())
}

/// Random placeholder avatar.
pub fn random_avatar() -> String {
    let seed: u32 = rand::rng().random_range(1..=1000);
    format!("https://picsum.photos/seed/avatar{seed}/100/100")
}

async fn active_session(state: &SharedState, quiz_id: &str) -> Result<QuizSession, ServiceError> {
    state
        .current_quiz()
        .await
        .filter(|quiz| quiz.id == quiz_id)
        .ok_or_else(|| ServiceError::NotFound(format!("quiz `{quiz_id}` not found")))
}

/// Dereference an invite: the shared session document, or not found.
pub async fn resolve_invite(state: &SharedState, quiz_id: &str) -> Result<InviteView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let quiz = store
        .find_quiz(quiz_id.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("quiz `{quiz_id}` not found")))?;
    let participants = store.list_participants(quiz.id.clone()).await?;

    Ok(InviteView {
        quiz_id: quiz.id,
        name: quiz.name,
        phase: quiz.phase.into(),
        question_count: quiz.questions.len(),
        participant_count: participants.len(),
    })
}

/// Join the active session. Joining again returns the existing record unchanged.
pub async fn join(
    state: &SharedState,
    quiz_id: &str,
    user_id: &str,
    email: Option<&str>,
) -> Result<JoinResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let quiz = active_session(state, quiz_id).await?;
    let phase = state.phase().await;
    if !matches!(phase, QuizPhase::Lobby | QuizPhase::Live | QuizPhase::Revealing) {
        return Err(ServiceError::SessionClosed(phase));
    }

    let month = scoring::month_key(SystemTime::now());
    let profile = match store.find_profile(user_id.to_owned()).await? {
        Some(profile) => profile,
        None => {
            let profile = ProfileEntity {
                user_id: user_id.to_owned(),
                nickname: fallback_name(email),
                icon: random_avatar(),
                jolly_available: true,
                monthly_quizzes_played: 0,
                counters_month: month.clone(),
            };
            store.save_profile(profile.clone()).await?;
            profile
        }
    };

    let name = Some(profile.nickname.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| fallback_name(email));
    let avatar = Some(profile.icon.clone())
        .filter(|icon| !icon.trim().is_empty())
        .unwrap_or_else(random_avatar);

    let outcome = store
        .join_participant(ParticipantEntity {
            quiz_id: quiz.id.clone(),
            id: user_id.to_owned(),
            name,
            avatar,
            score: 0,
            jolly_active: false,
            jolly_available: profile.jolly_available_in(&month),
            joined_at: SystemTime::now(),
        })
        .await?;

    if outcome.created {
        info!(quiz_id = %quiz.id, participant_id = user_id, ?phase, "participant joined");
        sse_events::broadcast_participant_joined(state, outcome.participant.clone());
    } else {
        debug!(quiz_id = %quiz.id, participant_id = user_id, "participant re-joined");
    }

    Ok(JoinResponse {
        participant: outcome.participant.into(),
        created: outcome.created,
    })
}

/// The session as seen by one participant.
pub async fn participant_view(
    state: &SharedState,
    quiz_id: &str,
    participant_id: &str,
) -> Result<ParticipantSessionView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let quiz = active_session(state, quiz_id).await?;
    let phase = state.phase().await;

    let participant = store
        .find_participant(quiz.id.clone(), participant_id.to_owned())
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("participant `{participant_id}` has not joined"))
        })?;

    let reveal = phase == QuizPhase::Revealing;
    let question = quiz
        .current_question()
        .filter(|_| phase.has_current_question());

    let my_answer = match question {
        Some(question) => store
            .find_answer(AnswerKey::new(
                quiz.id.clone(),
                question.id.clone(),
                participant_id,
            ))
            .await?
            .map(|answer| OwnAnswerView::new(answer, reveal)),
        None => None,
    };

    let jolly_eligible = phase == QuizPhase::Lobby
        && !participant.jolly_active
        && jolly::is_eligible(store.as_ref(), participant_id).await?;

    Ok(ParticipantSessionView {
        quiz_id: quiz.id.clone(),
        name: quiz.name.clone(),
        phase: phase.into(),
        me: participant.into(),
        question_index: quiz.current_question_index,
        question_count: quiz.questions.len(),
        question: question.map(|question| {
            ParticipantQuestionView::new(
                question,
                scoring::presented_options(question, participant_id),
                reveal,
            )
        }),
        question_started_at: quiz
            .question_started_at
            .filter(|_| question.is_some())
            .map(format_system_time),
        my_answer,
        jolly_eligible,
    })
}

/// Record an answer for the question currently open.
///
/// The first answer per (question, participant) wins; later ones have no effect. Answers to an
/// earlier question are still recorded under that question but can no longer change a total.
/// Outside the Live phase, or for a question not opened yet, the call is a no-op.
pub async fn submit_answer(
    state: &SharedState,
    quiz_id: &str,
    participant_id: &str,
    request: SubmitAnswerRequest,
) -> Result<SubmitAnswerResponse, ServiceError> {
    let store = state.require_quiz_store().await?;

    let _window = state.answer_window().read().await;
    if state.phase().await != QuizPhase::Live {
        debug!(quiz_id, participant_id, "answer ignored outside the live phase");
        return Ok(SubmitAnswerResponse::rejected());
    }

    let quiz = active_session(state, quiz_id).await?;
    let Some(index) = quiz.question_index(&request.question_id) else {
        return Err(ServiceError::NotFound(format!(
            "question `{}` not found",
            request.question_id
        )));
    };
    if index > quiz.current_question_index {
        debug!(quiz_id, question_id = %request.question_id, "answer ignored; question not open yet");
        return Ok(SubmitAnswerResponse::rejected());
    }
    let Some(question) = quiz.questions.get(index) else {
        return Ok(SubmitAnswerResponse::rejected());
    };
    let late = index < quiz.current_question_index || quiz.is_settled(&question.id);

    if store
        .find_participant(quiz.id.clone(), participant_id.to_owned())
        .await?
        .is_none()
    {
        return Err(ServiceError::Forbidden(
            "join the session before answering".into(),
        ));
    }

    let (answer_text, answer_order) = if question.is_reorder() {
        let order = request
            .answer_order
            .filter(|order| !order.is_empty())
            .ok_or_else(|| {
                ServiceError::InvalidInput("reorder questions expect `answer_order`".into())
            })?;
        (scoring::render_order(&order), Some(order))
    } else {
        let text = request
            .answer_text
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ServiceError::InvalidInput("`answer_text` is required".into()))?;
        (text, None)
    };

    let now = SystemTime::now();
    let response_time = scoring::response_time(quiz.question_started_at, now);
    let score = scoring::score_answer(
        question,
        &answer_text,
        answer_order.as_deref(),
        state.config().reward_points(),
    );

    let created = store
        .create_answer(AnswerEntity {
            quiz_id: quiz.id.clone(),
            question_id: question.id.clone(),
            participant_id: participant_id.to_owned(),
            answer_text,
            answer_order,
            response_time,
            score,
            is_cheating: None,
            cheating_reason: None,
            submitted_at: now,
        })
        .await?;

    if !created {
        debug!(quiz_id, participant_id, question_id = %question.id, "duplicate answer ignored");
        return Ok(SubmitAnswerResponse::rejected());
    }
    if late {
        info!(quiz_id, participant_id, question_id = %question.id, "late answer recorded");
    }

    Ok(SubmitAnswerResponse {
        accepted: true,
        response_time: Some(response_time),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_name_uses_email_prefix() {
        assert_eq!(fallback_name(Some("mario.rossi@example.com")), "mario.rossi");
        assert_eq!(fallback_name(Some("@example.com")), FALLBACK_NAME);
        assert_eq!(fallback_name(None), FALLBACK_NAME);
    }

    #[test]
    fn random_avatar_is_a_placeholder_url() {
        let avatar = random_avatar();
        assert!(avatar.starts_with("https://picsum.photos/seed/avatar"));
        assert!(avatar.ends_with("/100/100"));
    }
}
