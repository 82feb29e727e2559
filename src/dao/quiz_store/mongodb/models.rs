use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::{
    dao::{
        models::{
            AnswerEntity, HostRole, LeaderboardEntryEntity, ParticipantEntity, ProfileEntity,
            QuizEntity, SettingsEntity,
        },
        quiz_store::AnswerKey,
    },
    state::{quiz::Question, state_machine::QuizPhase},
};

pub const SETTINGS_ID: &str = "main";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    host_id: String,
    phase: QuizPhase,
    questions: Vec<Question>,
    current_question_index: i64,
    question_started_at: Option<DateTime>,
    #[serde(default)]
    settled_questions: Vec<String>,
    #[serde(default)]
    leaderboard_merged: bool,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<QuizEntity> for MongoQuizDocument {
    fn from(value: QuizEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            host_id: value.host_id,
            phase: value.phase,
            questions: value.questions,
            current_question_index: value.current_question_index as i64,
            question_started_at: value.question_started_at.map(DateTime::from_system_time),
            settled_questions: value.settled_questions,
            leaderboard_merged: value.leaderboard_merged,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoQuizDocument> for QuizEntity {
    fn from(value: MongoQuizDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            host_id: value.host_id,
            phase: value.phase,
            questions: value.questions,
            current_question_index: value.current_question_index.max(0) as usize,
            question_started_at: value.question_started_at.map(DateTime::to_system_time),
            settled_questions: value.settled_questions,
            leaderboard_merged: value.leaderboard_merged,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    #[serde(rename = "_id")]
    id: String,
    quiz_id: String,
    participant_id: String,
    name: String,
    avatar: String,
    score: i64,
    jolly_active: bool,
    jolly_available: bool,
    joined_at: DateTime,
}

impl From<MongoParticipantDocument> for ParticipantEntity {
    fn from(value: MongoParticipantDocument) -> Self {
        Self {
            quiz_id: value.quiz_id,
            id: value.participant_id,
            name: value.name,
            avatar: value.avatar,
            score: value.score,
            jolly_active: value.jolly_active,
            jolly_available: value.jolly_available,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

/// Fields written only when the participant document is first inserted.
pub fn participant_insert_fields(participant: &ParticipantEntity) -> Document {
    doc! {
        "quiz_id": participant.quiz_id.clone(),
        "participant_id": participant.id.clone(),
        "name": participant.name.clone(),
        "avatar": participant.avatar.clone(),
        "score": participant.score,
        "jolly_active": participant.jolly_active,
        "jolly_available": participant.jolly_available,
        "joined_at": DateTime::from_system_time(participant.joined_at),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    #[serde(rename = "_id")]
    id: String,
    quiz_id: String,
    question_id: String,
    participant_id: String,
    answer_text: String,
    answer_order: Option<Vec<String>>,
    response_time: f64,
    score: i64,
    is_cheating: Option<bool>,
    cheating_reason: Option<String>,
    submitted_at: DateTime,
}

impl From<MongoAnswerDocument> for AnswerEntity {
    fn from(value: MongoAnswerDocument) -> Self {
        Self {
            quiz_id: value.quiz_id,
            question_id: value.question_id,
            participant_id: value.participant_id,
            answer_text: value.answer_text,
            answer_order: value.answer_order,
            response_time: value.response_time,
            score: value.score,
            is_cheating: value.is_cheating,
            cheating_reason: value.cheating_reason,
            submitted_at: value.submitted_at.to_system_time(),
        }
    }
}

/// Fields written only when the answer document is first inserted.
pub fn answer_insert_fields(answer: &AnswerEntity) -> Document {
    doc! {
        "quiz_id": answer.quiz_id.clone(),
        "question_id": answer.question_id.clone(),
        "participant_id": answer.participant_id.clone(),
        "answer_text": answer.answer_text.clone(),
        "answer_order": answer.answer_order.clone(),
        "response_time": answer.response_time,
        "score": answer.score,
        "is_cheating": answer.is_cheating,
        "cheating_reason": answer.cheating_reason.clone(),
        "submitted_at": DateTime::from_system_time(answer.submitted_at),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLeaderboardDocument {
    #[serde(rename = "_id")]
    id: String,
    month: String,
    name: String,
    avatar: String,
    monthly_score: i64,
}

impl From<MongoLeaderboardDocument> for LeaderboardEntryEntity {
    fn from(value: MongoLeaderboardDocument) -> Self {
        Self {
            month: value.month,
            name: value.name,
            avatar: value.avatar,
            monthly_score: value.monthly_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProfileDocument {
    #[serde(rename = "_id")]
    id: String,
    nickname: String,
    icon: String,
    #[serde(default = "default_true")]
    jolly_available: bool,
    #[serde(default)]
    monthly_quizzes_played: i64,
    #[serde(default)]
    counters_month: String,
}

impl From<ProfileEntity> for MongoProfileDocument {
    fn from(value: ProfileEntity) -> Self {
        Self {
            id: value.user_id,
            nickname: value.nickname,
            icon: value.icon,
            jolly_available: value.jolly_available,
            monthly_quizzes_played: i64::from(value.monthly_quizzes_played),
            counters_month: value.counters_month,
        }
    }
}

impl From<MongoProfileDocument> for ProfileEntity {
    fn from(value: MongoProfileDocument) -> Self {
        Self {
            user_id: value.id,
            nickname: value.nickname,
            icon: value.icon,
            jolly_available: value.jolly_available,
            monthly_quizzes_played: u32::try_from(value.monthly_quizzes_played).unwrap_or(0),
            counters_month: value.counters_month,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoHostDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub role: HostRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSettingsDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    rules_text: String,
    #[serde(default = "default_true")]
    jolly_enabled: bool,
    #[serde(default)]
    total_quizzes_held: i64,
    #[serde(default)]
    held_month: String,
}

impl From<MongoSettingsDocument> for SettingsEntity {
    fn from(value: MongoSettingsDocument) -> Self {
        Self {
            rules_text: value.rules_text,
            jolly_enabled: value.jolly_enabled,
            total_quizzes_held: u32::try_from(value.total_quizzes_held).unwrap_or(0),
            held_month: value.held_month,
        }
    }
}

fn default_true() -> bool {
    true
}

pub fn participant_doc_id(quiz_id: &str, participant_id: &str) -> String {
    format!("{quiz_id}:{participant_id}")
}

pub fn answer_doc_id(key: &AnswerKey) -> String {
    format!("{}:{}:{}", key.quiz_id, key.question_id, key.participant_id)
}

pub fn leaderboard_doc_id(month: &str, name: &str) -> String {
    format!("{month}:{name}")
}

pub fn doc_id(id: impl Into<String>) -> Document {
    doc! {"_id": id.into()}
}

/// Matches `id` when its `field` month key differs from `month` (or is missing).
pub fn stale_month(id: impl Into<String>, field: &str, month: &str) -> Document {
    doc! {"_id": id.into(), field: {"$ne": month}}
}

/// Start a profile's monthly counter and bonus token over at `month`.
pub fn roll_profile(month: &str) -> Document {
    doc! {
        "$set": {
            "counters_month": month,
            "monthly_quizzes_played": 0_i64,
            "jolly_available": true,
        }
    }
}
