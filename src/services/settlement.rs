//! Score settlement and the end-of-session leaderboard merge.

use std::time::SystemTime;

use tracing::{debug, info};

use crate::{
    dao::{models::ParticipantEntity, quiz_store::QuizStore},
    error::ServiceError,
    services::{scoring, sse_events},
    state::SharedState,
};

/// Commit the stored per-question scores of `question_id` into participant totals.
///
/// Submissions are held off while the answers are read and committed, so nothing lands between
/// the read and the commit. A question settled earlier is skipped by the store itself. Returns the
/// freshly read participant totals.
pub async fn settle_question(
    state: &SharedState,
    store: &dyn QuizStore,
    quiz_id: &str,
    question_id: &str,
) -> Result<Vec<ParticipantEntity>, ServiceError> {
    let already_settled = state
        .read_current_quiz(|quiz| quiz.is_some_and(|quiz| quiz.is_settled(question_id)))
        .await;

    if already_settled {
        debug!(quiz_id, question_id, "question already settled");
    } else {
        let _window = state.answer_window().write().await;
        let participants = store.list_participants(quiz_id.to_owned()).await?;
        let answers = store
            .list_answers(quiz_id.to_owned(), question_id.to_owned())
            .await?;
        let increments = scoring::settlement_increments(&participants, &answers);

        let committed = store
            .commit_settlement(quiz_id.to_owned(), question_id.to_owned(), increments)
            .await?;
        if committed {
            info!(
                quiz_id,
                question_id,
                participants = participants.len(),
                answers = answers.len(),
                "question settled"
            );
        } else {
            debug!(quiz_id, question_id, "store reports question already settled");
        }

        state
            .with_current_quiz_mut(|quiz| {
                if !quiz.is_settled(question_id) {
                    quiz.settled_questions.push(question_id.to_owned());
                }
            })
            .await;
    }

    let totals = store.list_participants(quiz_id.to_owned()).await?;
    if !already_settled {
        sse_events::broadcast_scores_settled(state, quiz_id, question_id, totals.clone());
    }
    Ok(totals)
}

/// Fold the final totals of the session into the current month's leaderboard, once.
///
/// Totals are read from the store rather than from any cached copy.
pub async fn merge_final_scores(
    state: &SharedState,
    store: &dyn QuizStore,
    quiz_id: &str,
) -> Result<bool, ServiceError> {
    let merged_before = state
        .read_current_quiz(|quiz| quiz.is_some_and(|quiz| quiz.leaderboard_merged))
        .await;
    if merged_before {
        debug!(quiz_id, "leaderboard already merged for this session");
        return Ok(false);
    }

    let participants = store.list_participants(quiz_id.to_owned()).await?;
    let contributions = scoring::leaderboard_contributions(&participants);
    let month = scoring::month_key(SystemTime::now());

    let merged = store
        .merge_leaderboard(quiz_id.to_owned(), month.clone(), contributions)
        .await?;
    if merged {
        info!(quiz_id, %month, participants = participants.len(), "leaderboard merged");
    }

    state
        .with_current_quiz_mut(|quiz| quiz.leaderboard_merged = true)
        .await;
    Ok(merged)
}
