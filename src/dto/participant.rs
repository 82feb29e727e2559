//! DTOs of the participant API: invites, joins, answers and the bonus token.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{AnswerEntity, ParticipantEntity},
    dto::{format_system_time, phase::VisiblePhase, quiz::ParticipantQuestionView},
};

/// Result of dereferencing an invite reference.
#[derive(Debug, Serialize, ToSchema)]
pub struct InviteView {
    /// Session id.
    pub quiz_id: String,
    /// Display name of the quiz.
    pub name: String,
    /// Current phase.
    pub phase: VisiblePhase,
    /// Number of questions.
    pub question_count: usize,
    /// Number of joined participants.
    pub participant_count: usize,
}

/// Join payload. The e-mail only feeds the fallback display name.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    /// E-mail of the caller.
    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,
}

/// Participant record as exposed over the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantView {
    /// User identity.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub avatar: String,
    /// Committed total of the session.
    pub score: i64,
    /// Whether the bonus doubles this session.
    pub jolly_active: bool,
    /// Whether the bonus token was unused at join time.
    pub jolly_available: bool,
    /// RFC 3339 join time.
    pub joined_at: String,
}

impl From<ParticipantEntity> for ParticipantView {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar: value.avatar,
            score: value.score,
            jolly_active: value.jolly_active,
            jolly_available: value.jolly_available,
            joined_at: format_system_time(value.joined_at),
        }
    }
}

/// Outcome of a join; `created` is false for a re-join.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// Stored participant record.
    pub participant: ParticipantView,
    /// False for a re-join.
    pub created: bool,
}

/// What a participant sees of the session.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantSessionView {
    /// Session id.
    pub quiz_id: String,
    /// Display name of the quiz.
    pub name: String,
    /// Current phase.
    pub phase: VisiblePhase,
    /// The caller's own record.
    pub me: ParticipantView,
    /// Zero-based index of the current question.
    pub question_index: usize,
    /// Number of questions.
    pub question_count: usize,
    /// Present while a question is open or revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<ParticipantQuestionView>,
    /// RFC 3339 time the current question opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_started_at: Option<String>,
    /// The participant's answer to the current question, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_answer: Option<OwnAnswerView>,
    /// Whether the bonus token can be activated right now.
    pub jolly_eligible: bool,
}

/// A participant's own answer. The score is withheld until the question is revealed.
#[derive(Debug, Serialize, ToSchema)]
pub struct OwnAnswerView {
    /// Selected option, free text or rendered order.
    pub answer_text: String,
    /// Submitted permutation, reorder questions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_order: Option<Vec<String>>,
    /// Seconds since the question opened.
    pub response_time: f64,
    /// Points, once revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

impl OwnAnswerView {
    /// Project a stored answer, exposing the score only when `reveal` is set.
    pub fn new(answer: AnswerEntity, reveal: bool) -> Self {
        Self {
            answer_text: answer.answer_text,
            answer_order: answer.answer_order,
            response_time: answer.response_time,
            score: reveal.then_some(answer.score),
        }
    }
}

/// Answer submission for the current question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// Question being answered.
    #[validate(length(min = 1))]
    pub question_id: String,
    /// Free text or the selected option.
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub answer_text: Option<String>,
    /// Submitted permutation, reorder questions only.
    #[serde(default)]
    pub answer_order: Option<Vec<String>>,
}

/// Outcome of a submission. `accepted` is false when nothing was recorded.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    /// Whether a new answer was stored.
    pub accepted: bool,
    /// Recorded response time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
}

impl SubmitAnswerResponse {
    /// Submission ignored.
    pub fn rejected() -> Self {
        Self {
            accepted: false,
            response_time: None,
        }
    }
}

/// Outcome of a bonus activation attempt.
#[derive(Debug, Serialize, ToSchema)]
pub struct JollyResponse {
    /// False when nothing changed.
    pub applied: bool,
    /// Whether the bonus is engaged for this session.
    pub jolly_active: bool,
}
