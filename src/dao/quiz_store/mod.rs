pub mod memory;
#[cfg(feature = "mongo-store")]
/// MongoDB backend.
pub mod mongodb;

use futures::future::BoxFuture;
use tokio::sync::broadcast;

use crate::dao::models::{
    AnswerEntity, HostRole, LeaderboardContribution, LeaderboardEntryEntity, ParticipantEntity,
    ProfileEntity, QuizEntity, ScoreIncrement, SettingsEntity, StoreEvent,
};
use crate::dao::storage::StorageResult;
use crate::state::quiz::{ParticipantId, QuestionId, QuizId};

/// Composite identity of an answer document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnswerKey {
    /// Owning session.
    pub quiz_id: QuizId,
    /// Question answered.
    pub question_id: QuestionId,
    /// Author of the answer.
    pub participant_id: ParticipantId,
}

impl AnswerKey {
    /// Build a key from its three parts.
    pub fn new(
        quiz_id: impl Into<QuizId>,
        question_id: impl Into<QuestionId>,
        participant_id: impl Into<ParticipantId>,
    ) -> Self {
        Self {
            quiz_id: quiz_id.into(),
            question_id: question_id.into(),
            participant_id: participant_id.into(),
        }
    }

    /// Key of an existing answer.
    pub fn of(answer: &AnswerEntity) -> Self {
        Self::new(
            answer.quiz_id.clone(),
            answer.question_id.clone(),
            answer.participant_id.clone(),
        )
    }
}

/// Result of a join: the stored participant and whether this call created it.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Participant record as stored.
    pub participant: ParticipantEntity,
    /// False when the participant had already joined.
    pub created: bool,
}

/// Abstraction over the transactional document store backing quiz sessions.
///
/// Multi-document operations (`commit_settlement`, `reset_session`, `merge_leaderboard`,
/// `activate_jolly`) are all-or-nothing and use increments rather than read-modify-write.
pub trait QuizStore: Send + Sync {
    /// Insert or replace the session document.
    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a session by id.
    fn find_quiz(&self, id: QuizId) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>>;
    /// Remove the session together with its participants and answers.
    fn delete_quiz(&self, id: QuizId) -> BoxFuture<'static, StorageResult<bool>>;

    /// Create the participant unless it already joined, in which case the stored record wins.
    fn join_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<JoinOutcome>>;
    /// Load one participant of a session.
    fn find_participant(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// Every participant of a session.
    fn list_participants(
        &self,
        quiz_id: QuizId,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;

    /// Write-once creation; returns false when an answer already exists for the key.
    fn create_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Load one answer.
    fn find_answer(&self, key: AnswerKey) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>>;
    /// Every answer to one question.
    fn list_answers(
        &self,
        quiz_id: QuizId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;
    /// Returns false when no answer exists for the key.
    fn set_answer_score(&self, key: AnswerKey, score: i64)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// Store the oracle verdict on an answer.
    fn annotate_answer(
        &self,
        key: AnswerKey,
        is_cheating: bool,
        reason: String,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Add every increment and mark the question settled, atomically.
    /// Returns false without writing when the question was already settled.
    fn commit_settlement(
        &self,
        quiz_id: QuizId,
        question_id: QuestionId,
        increments: Vec<ScoreIncrement>,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Zero every score, forget settled questions and drop the answers, atomically.
    fn reset_session(&self, quiz_id: QuizId) -> BoxFuture<'static, StorageResult<()>>;

    /// Create-or-increment monthly entries, count attendance and the held session, atomically.
    /// Profile and settings counters from an earlier month start over at `month`.
    /// Returns false without writing when the session was already merged.
    fn merge_leaderboard(
        &self,
        quiz_id: QuizId,
        month: String,
        contributions: Vec<LeaderboardContribution>,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Every entry of `month`, unordered.
    fn list_leaderboard(
        &self,
        month: String,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>>;
    /// Drop the entries of `month` and zero the attendance and held counters kept for it.
    /// Returns the number of entries removed.
    fn clear_leaderboard(&self, month: String) -> BoxFuture<'static, StorageResult<u64>>;

    /// Engage the bonus on the participant and consume the profile token of `month`,
    /// atomically. Returns false when the token is gone or the bonus is already active.
    fn activate_jolly(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
        month: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Load a user profile.
    fn find_profile(&self, user_id: String)
    -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>>;
    /// Insert or replace a user profile.
    fn save_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Role of a host identity, if any.
    fn find_host_role(&self, user_id: String)
    -> BoxFuture<'static, StorageResult<Option<HostRole>>>;
    /// Grant `role` to `user_id`.
    fn save_host_role(
        &self,
        user_id: String,
        role: HostRole,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// The settings document, defaults when absent.
    fn find_settings(&self) -> BoxFuture<'static, StorageResult<SettingsEntity>>;
    /// Persist the host-editable fields; `total_quizzes_held` is only moved by
    /// [`QuizStore::merge_leaderboard`].
    fn save_settings(&self, settings: SettingsEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Change feed of writes performed through this store.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    /// Cheap round-trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
