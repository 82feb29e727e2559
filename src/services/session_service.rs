//! Host-driven session lifecycle: publish, begin, reveal, advance, restart and reset.
//!
//! Every action claims the transition gate first, reads the session under it and treats unmet
//! preconditions as no-ops reported with `applied = false`.

use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};

use crate::{
    dao::quiz_store::{AnswerKey, QuizStore},
    dto::{
        format_system_time,
        host::{ActionResponse, AnswerView, HostSessionView, ScoreOverrideResponse},
        participant::ParticipantView,
        quiz::QuestionView,
    },
    error::ServiceError,
    services::{access::HostIdentity, scoring, settlement, sse_events},
    state::{
        SharedState,
        draft::Draft,
        quiz::QuizSession,
        state_machine::{QuizEvent, QuizPhase},
        transitions::{run_gated_transition_with_broadcast, run_transition_with_broadcast},
    },
};

/// Path participants follow to join the session.
pub fn invite_path(quiz_id: &str) -> String {
    format!("/join/{quiz_id}")
}

async fn action_response(state: &SharedState, applied: bool) -> ActionResponse {
    ActionResponse {
        applied,
        phase: state.phase().await.into(),
        quiz_id: state
            .read_current_quiz(|quiz| quiz.map(|quiz| quiz.id.clone()))
            .await,
    }
}

/// Apply `change` to a copy of the active session, persist it under `phase`, then adopt it.
///
/// The local session is only replaced once the store accepted the write.
async fn commit_session(
    state: &SharedState,
    store: &dyn QuizStore,
    phase: QuizPhase,
    change: impl FnOnce(&mut QuizSession),
) -> Result<(), ServiceError> {
    let mut next = state
        .current_quiz()
        .await
        .ok_or(ServiceError::NoSession)?;
    change(&mut next);
    store.save_quiz(next.to_entity(phase)).await?;
    state.with_current_quiz_mut(|current| *current = next).await;
    Ok(())
}

/// Publish the draft as a shared session (Authoring → Lobby).
pub async fn publish(
    state: &SharedState,
    host: &HostIdentity,
) -> Result<ActionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let Some(session) = state.draft().await.publish(&host.user_id, SystemTime::now()) else {
        debug!("publish ignored; the draft has no question");
        return Ok(action_response(state, false).await);
    };

    let applied = run_transition_with_broadcast(state, QuizEvent::Publish, || async move {
        store.save_quiz(session.to_entity(QuizPhase::Lobby)).await?;
        info!(
            quiz_id = %session.id,
            questions = session.questions.len(),
            host = %session.host_id,
            "session published"
        );
        state.set_current_quiz(Some(session)).await;
        Ok(())
    })
    .await?
    .is_some();

    Ok(action_response(state, applied).await)
}

/// Open the first question (Lobby → Live). Requires at least one participant.
pub async fn begin(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let Some(gate) = state.try_enter_transition() else {
        debug!("begin ignored; another transition is in flight");
        return Ok(action_response(state, false).await);
    };

    let Some(quiz) = state.current_quiz().await else {
        return Ok(action_response(state, false).await);
    };
    if state.phase().await != QuizPhase::Lobby {
        debug!(quiz_id = %quiz.id, "begin ignored outside the lobby");
        return Ok(action_response(state, false).await);
    }
    let participants = store.list_participants(quiz.id.clone()).await?;
    if participants.is_empty() {
        debug!(quiz_id = %quiz.id, "begin ignored; nobody joined yet");
        return Ok(action_response(state, false).await);
    }

    let applied = run_gated_transition_with_broadcast(state, &gate, QuizEvent::Begin, || async {
        commit_session(state, store.as_ref(), QuizPhase::Live, |quiz| {
            quiz.open_question(0, SystemTime::now())
        })
        .await
    })
    .await?
    .is_some();
    drop(gate);

    if applied {
        info!(quiz_id = %quiz.id, participants = participants.len(), "session started");
    }
    Ok(action_response(state, applied).await)
}

/// Disclose the answer of the current question (Live → Revealing).
pub async fn reveal(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let Some(gate) = state.try_enter_transition() else {
        return Ok(action_response(state, false).await);
    };

    let applied = run_gated_transition_with_broadcast(state, &gate, QuizEvent::Reveal, || async {
        commit_session(state, store.as_ref(), QuizPhase::Revealing, |quiz| {
            quiz.updated_at = SystemTime::now()
        })
        .await
    })
    .await?
    .is_some();
    drop(gate);

    Ok(action_response(state, applied).await)
}

/// Settle the current question, then open the next one or end the session.
///
/// On the last question the leaderboard merge runs before the phase flips to Ended. Any failure
/// leaves the phase and cursor untouched so the host can retry; already committed work is
/// skipped on retry.
pub async fn advance(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let Some(gate) = state.try_enter_transition() else {
        debug!("advance ignored; another transition is in flight");
        return Ok(action_response(state, false).await);
    };

    let phase = state.phase().await;
    let Some(quiz) = state
        .current_quiz()
        .await
        .filter(|_| phase.has_current_question())
    else {
        debug!(?phase, "advance ignored; no question is running");
        return Ok(action_response(state, false).await);
    };
    let Some(question_id) = quiz.current_question().map(|question| question.id.clone()) else {
        return Ok(action_response(state, false).await);
    };

    let finishing = quiz.is_last_question();
    let event = if finishing {
        QuizEvent::Finish
    } else {
        QuizEvent::Advance
    };
    let next_index = quiz.current_question_index + 1;

    let applied = run_gated_transition_with_broadcast(state, &gate, event, || async {
        settlement::settle_question(state, store.as_ref(), &quiz.id, &question_id).await?;

        if finishing {
            settlement::merge_final_scores(state, store.as_ref(), &quiz.id).await?;
            commit_session(state, store.as_ref(), QuizPhase::Ended, |quiz| {
                quiz.updated_at = SystemTime::now()
            })
            .await
        } else {
            commit_session(state, store.as_ref(), QuizPhase::Live, |quiz| {
                quiz.open_question(next_index, SystemTime::now())
            })
            .await
        }
    })
    .await?
    .is_some();
    drop(gate);

    if applied && finishing {
        info!(quiz_id = %quiz.id, "session ended");
    }
    Ok(action_response(state, applied).await)
}

/// Replay an ended session from the first question (Ended → Live).
///
/// Scores and answers are wiped; the leaderboard is left alone.
pub async fn restart(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let Some(gate) = state.try_enter_transition() else {
        return Ok(action_response(state, false).await);
    };
    let Some(quiz_id) = state
        .read_current_quiz(|quiz| quiz.map(|quiz| quiz.id.clone()))
        .await
    else {
        return Ok(action_response(state, false).await);
    };

    let applied = run_gated_transition_with_broadcast(state, &gate, QuizEvent::Restart, || async {
        store.reset_session(quiz_id.clone()).await?;
        state.ingestion().reset_processed();
        commit_session(state, store.as_ref(), QuizPhase::Live, |quiz| {
            quiz.settled_questions.clear();
            quiz.open_question(0, SystemTime::now());
        })
        .await
    })
    .await?
    .is_some();
    drop(gate);

    if applied {
        info!(%quiz_id, "session restarted as a practice replay");
    }
    Ok(action_response(state, applied).await)
}

/// Throw the shared session away and return to a fresh draft.
///
/// While authoring there is no shared session, so only the draft is cleared. Blocked while
/// another transition (such as a settlement) is running.
pub async fn reset(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let Some(gate) = state.try_enter_transition() else {
        debug!("reset ignored; another transition is in flight");
        return Ok(action_response(state, false).await);
    };
    if state.phase().await == QuizPhase::Authoring {
        let discarded = state
            .with_draft_mut(|draft| std::mem::take(draft).questions.len())
            .await;
        drop(gate);
        info!(discarded, "draft reset");
        return Ok(action_response(state, true).await);
    }

    let store = state.require_quiz_store().await?;
    let quiz_id = state
        .read_current_quiz(|quiz| quiz.map(|quiz| quiz.id.clone()))
        .await;

    let deleted = run_gated_transition_with_broadcast(state, &gate, QuizEvent::Discard, || async {
        if let Some(quiz_id) = &quiz_id {
            store.delete_quiz(quiz_id.clone()).await?;
        }
        state.set_current_quiz(None).await;
        state.with_draft_mut(|draft| *draft = Draft::default()).await;
        Ok(quiz_id.clone())
    })
    .await?;
    drop(gate);

    let applied = deleted.is_some();
    if let Some(Some(quiz_id)) = deleted {
        info!(%quiz_id, "session discarded");
        sse_events::broadcast_session_deleted(state, &quiz_id);
    }
    Ok(action_response(state, applied).await)
}

/// Pick up the session the host was driving before a restart of the server.
///
/// Returns whether a session was resumed. A session that no longer exists is forgotten.
pub async fn resume_active_session(state: &SharedState) -> Result<bool, ServiceError> {
    let store = state.require_quiz_store().await?;
    let Some(quiz_id) = state.take_pending_resume().await else {
        return Ok(false);
    };

    let Some(entity) = store.find_quiz(quiz_id.clone()).await? else {
        info!(%quiz_id, "previous session no longer exists; starting from the draft");
        state.set_current_quiz(None).await;
        return Ok(false);
    };

    let phase = entity.phase;
    if phase == QuizPhase::Authoring {
        return Ok(false);
    }
    let session = QuizSession::from(entity);

    let resumed = run_transition_with_broadcast(state, QuizEvent::Resume(phase), || async move {
        state.set_current_quiz(Some(session)).await;
        Ok(())
    })
    .await?
    .is_some();

    if resumed {
        info!(%quiz_id, ?phase, "resumed previous session");
    } else {
        warn!(%quiz_id, "could not resume previous session; a session is already active");
    }
    Ok(resumed)
}

/// Everything the host console shows about the active session.
pub async fn host_view(state: &SharedState) -> Result<HostSessionView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let quiz = state
        .current_quiz()
        .await
        .ok_or(ServiceError::NoSession)?;
    let phase = state.phase().await;

    let mut participants = store.list_participants(quiz.id.clone()).await?;
    participants.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));

    let answers = match quiz.current_question() {
        Some(question) if phase.has_current_question() => {
            store
                .list_answers(quiz.id.clone(), question.id.clone())
                .await?
        }
        _ => Vec::new(),
    };

    Ok(HostSessionView {
        invite_path: invite_path(&quiz.id),
        quiz_id: quiz.id,
        name: quiz.name,
        phase: phase.into(),
        question_index: quiz.current_question_index,
        questions: quiz.questions.iter().map(QuestionView::from).collect(),
        question_started_at: quiz.question_started_at.map(format_system_time),
        participants: participants.into_iter().map(ParticipantView::from).collect(),
        answers: answers.into_iter().map(AnswerView::from).collect(),
        settled_questions: quiz.settled_questions,
        leaderboard_merged: quiz.leaderboard_merged,
    })
}

/// Manually score one answer before its question is settled.
///
/// Negative or unreadable values become 0. Unchanged values and settled questions are no-ops.
pub async fn override_score(
    state: &SharedState,
    question_id: String,
    participant_id: String,
    value: &serde_json::Value,
) -> Result<ScoreOverrideResponse, ServiceError> {
    let store: Arc<dyn QuizStore> = state.require_quiz_store().await?;
    let score = scoring::parse_score_override(value);

    // Settlement takes the write side while it reads and commits the answers.
    let _window = state.answer_window().read().await;
    let (quiz_id, settled) = state
        .read_current_quiz(|quiz| {
            quiz.filter(|quiz| quiz.question(&question_id).is_some())
                .map(|quiz| (quiz.id.clone(), quiz.is_settled(&question_id)))
        })
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("question `{question_id}` not found")))?;

    let key = AnswerKey::new(quiz_id, question_id, participant_id);
    let answer = store.find_answer(key.clone()).await?.ok_or_else(|| {
        ServiceError::NotFound(format!(
            "no answer from `{}` to question `{}`",
            key.participant_id, key.question_id
        ))
    })?;

    if settled {
        debug!(question_id = %key.question_id, "score override ignored; question already settled");
        return Ok(ScoreOverrideResponse {
            applied: false,
            score: answer.score,
        });
    }
    if answer.score == score {
        return Ok(ScoreOverrideResponse {
            applied: false,
            score,
        });
    }

    store.set_answer_score(key.clone(), score).await?;
    sse_events::broadcast_answer_scored(state, &key, score);
    Ok(ScoreOverrideResponse {
        applied: true,
        score,
    })
}
