//! DTO definitions used by the host REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::AnswerEntity,
    dto::{
        format_system_time, participant::ParticipantView, phase::VisiblePhase, quiz::QuestionView,
    },
    state::draft::Draft,
};

/// Host draft as currently authored.
#[derive(Debug, Serialize, ToSchema)]
pub struct DraftView {
    /// Display name of the quiz.
    pub name: String,
    /// Questions in authored order.
    pub questions: Vec<QuestionView>,
}

impl From<&Draft> for DraftView {
    fn from(value: &Draft) -> Self {
        Self {
            name: value.name.clone(),
            questions: value.questions.iter().map(QuestionView::from).collect(),
        }
    }
}

/// Request to rename the draft.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RenameDraftRequest {
    /// New display name.
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

/// Acknowledgement of a session action. `applied` is false when the action was a no-op.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// False when the action changed nothing.
    pub applied: bool,
    /// Phase after the action.
    pub phase: VisiblePhase,
    /// Active session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<String>,
}

/// One stored answer with its oracle annotation.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerView {
    /// Question answered.
    pub question_id: String,
    /// Author of the answer.
    pub participant_id: String,
    /// Selected option, free text or rendered order.
    pub answer_text: String,
    /// Submitted permutation, reorder questions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_order: Option<Vec<String>>,
    /// Seconds since the question opened.
    pub response_time: f64,
    /// Points the answer is worth.
    pub score: i64,
    /// Absent until the oracle answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_cheating: Option<bool>,
    /// Oracle explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheating_reason: Option<String>,
    /// RFC 3339 submission time.
    pub submitted_at: String,
}

impl From<AnswerEntity> for AnswerView {
    fn from(value: AnswerEntity) -> Self {
        Self {
            question_id: value.question_id,
            participant_id: value.participant_id,
            answer_text: value.answer_text,
            answer_order: value.answer_order,
            response_time: value.response_time,
            score: value.score,
            is_cheating: value.is_cheating,
            cheating_reason: value.cheating_reason,
            submitted_at: format_system_time(value.submitted_at),
        }
    }
}

/// Host view of the active session.
#[derive(Debug, Serialize, ToSchema)]
pub struct HostSessionView {
    /// Session id.
    pub quiz_id: String,
    /// Display name of the quiz.
    pub name: String,
    /// Current phase.
    pub phase: VisiblePhase,
    /// Path participants open to join.
    pub invite_path: String,
    /// Zero-based index of the current question.
    pub question_index: usize,
    /// Every question, solutions included.
    pub questions: Vec<QuestionView>,
    /// RFC 3339 time the current question opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_started_at: Option<String>,
    /// Joined participants with their committed totals.
    pub participants: Vec<ParticipantView>,
    /// Answers to the current question.
    pub answers: Vec<AnswerView>,
    /// Ids of the questions already settled.
    pub settled_questions: Vec<String>,
    /// Whether the session already counted towards the leaderboard.
    pub leaderboard_merged: bool,
}

/// Manual score for one answer. Accepts a number or a numeric string.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScoreOverrideRequest {
    /// Requested points.
    #[schema(value_type = Object)]
    pub score: serde_json::Value,
}

/// Result of a score override.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreOverrideResponse {
    /// False when the score was unchanged or the question already settled.
    pub applied: bool,
    /// Score now stored on the answer.
    pub score: i64,
}
