//! Domain model of a published quiz session and its questions.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{dao::models::QuizEntity, state::state_machine::QuizPhase};

/// Short opaque identifier of a published session, embedded in invite links.
pub type QuizId = String;
/// Identifier of a question, unique within a session.
pub type QuestionId = String;
/// Stable user identity of a participant.
pub type ParticipantId = String;

/// A single authored question. Immutable once the session is published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    /// Identifier unique within the quiz.
    pub id: QuestionId,
    /// Prompt shown to participants.
    pub text: String,
    /// Question shape and its reference solution.
    pub kind: QuestionKind,
}

/// Question shape. Media-bearing variants carry the sub-mode that governs scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    /// Pick one option; `correct_answer` is one of `options`.
    MultipleChoice {
        /// Choices in authored order.
        options: Vec<String>,
        /// The option considered correct.
        correct_answer: String,
    },
    /// Free text, scored manually by the host. `correct_answer` is only a reference.
    OpenEnded {
        /// Reference answer, possibly empty.
        correct_answer: String,
    },
    /// Put the options back in `correct_order`.
    Reorder {
        /// Items as presented before shuffling.
        options: Vec<String>,
        /// Target ordering, a permutation of `options`.
        correct_order: Vec<String>,
    },
    /// Multiple choice around an image, video or audio clip.
    MediaMultipleChoice {
        /// Attached media.
        media: Media,
        /// Choices in authored order.
        options: Vec<String>,
        /// The option considered correct.
        correct_answer: String,
    },
    /// Free text around an image, video or audio clip.
    MediaOpenEnded {
        /// Attached media.
        media: Media,
        /// Reference answer, possibly empty.
        correct_answer: String,
    },
}

/// Media attached to a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Media {
    /// Media family.
    pub kind: MediaKind,
    /// Where clients fetch the media from.
    pub url: String,
}

/// Media families supported by media-bearing questions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still picture.
    Image,
    /// Video clip.
    Video,
    /// Audio clip.
    Audio,
}

impl Question {
    /// Options presented to participants, empty for free-text questions.
    pub fn options(&self) -> &[String] {
        match &self.kind {
            QuestionKind::MultipleChoice { options, .. }
            | QuestionKind::Reorder { options, .. }
            | QuestionKind::MediaMultipleChoice { options, .. } => options,
            QuestionKind::OpenEnded { .. } | QuestionKind::MediaOpenEnded { .. } => &[],
        }
    }

    /// Media attached to the question, if any.
    pub fn media(&self) -> Option<&Media> {
        match &self.kind {
            QuestionKind::MediaMultipleChoice { media, .. }
            | QuestionKind::MediaOpenEnded { media, .. } => Some(media),
            _ => None,
        }
    }

    /// Whether answers are scored at submission time rather than by the host.
    pub fn is_auto_scored(&self) -> bool {
        matches!(
            self.kind,
            QuestionKind::MultipleChoice { .. }
                | QuestionKind::Reorder { .. }
                | QuestionKind::MediaMultipleChoice { .. }
        )
    }

    /// Whether participants submit an ordering instead of a text.
    pub fn is_reorder(&self) -> bool {
        matches!(self.kind, QuestionKind::Reorder { .. })
    }
}

/// Authoritative session aggregate held by the host process.
///
/// The phase is owned by the state machine; participants and answers live in the store and are
/// always read fresh.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSession {
    /// Session identifier, also the invite reference.
    pub id: QuizId,
    /// Display name.
    pub name: String,
    /// Owning host identity.
    pub host_id: String,
    /// Ordered questions, frozen at publish time.
    pub questions: Vec<Question>,
    /// Cursor into `questions`.
    pub current_question_index: usize,
    /// When the current question was opened to participants.
    pub question_started_at: Option<SystemTime>,
    /// Questions whose scores were already committed to participant totals.
    pub settled_questions: Vec<QuestionId>,
    /// Whether final scores were already folded into the monthly leaderboard.
    pub leaderboard_merged: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the session document was written.
    pub updated_at: SystemTime,
}

impl QuizSession {
    /// Question under the cursor.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Position of a question in the session.
    pub fn question_index(&self, question_id: &str) -> Option<usize> {
        self.questions.iter().position(|q| q.id == question_id)
    }

    /// Look up a question by identifier.
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Whether the cursor sits on the final question.
    pub fn is_last_question(&self) -> bool {
        self.current_question_index + 1 >= self.questions.len()
    }

    /// Whether scores of `question_id` were already committed.
    pub fn is_settled(&self, question_id: &str) -> bool {
        self.settled_questions.iter().any(|id| id == question_id)
    }

    /// Move the cursor and restart the question clock.
    pub fn open_question(&mut self, index: usize, now: SystemTime) {
        self.current_question_index = index;
        self.question_started_at = Some(now);
        self.updated_at = now;
    }

    /// Build the persisted document for the given phase.
    pub fn to_entity(&self, phase: QuizPhase) -> QuizEntity {
        QuizEntity {
            id: self.id.clone(),
            name: self.name.clone(),
            host_id: self.host_id.clone(),
            phase,
            questions: self.questions.clone(),
            current_question_index: self.current_question_index,
            question_started_at: self.question_started_at,
            settled_questions: self.settled_questions.clone(),
            leaderboard_merged: self.leaderboard_merged,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<QuizEntity> for QuizSession {
    fn from(value: QuizEntity) -> Self {
        let last = value.questions.len().saturating_sub(1);
        Self {
            id: value.id,
            name: value.name,
            host_id: value.host_id,
            current_question_index: value.current_question_index.min(last),
            questions: value.questions,
            question_started_at: value.question_started_at,
            settled_questions: value.settled_questions,
            leaderboard_merged: value.leaderboard_merged,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reorder() -> Question {
        Question {
            id: "q2".into(),
            text: "Sort the planets by size".into(),
            kind: QuestionKind::Reorder {
                options: vec!["Earth".into(), "Jupiter".into()],
                correct_order: vec!["Jupiter".into(), "Earth".into()],
            },
        }
    }

    #[test]
    fn question_kind_serializes_as_tagged_union() {
        let value = serde_json::to_value(reorder()).unwrap();
        assert_eq!(value["kind"]["type"], "reorder");
        assert_eq!(value["kind"]["correct_order"][0], "Jupiter");

        let media = Question {
            id: "q3".into(),
            text: "Who is singing in this clip?".into(),
            kind: QuestionKind::MediaOpenEnded {
                media: Media {
                    kind: MediaKind::Audio,
                    url: "https://cdn.example/clip.mp3".into(),
                },
                correct_answer: String::new(),
            },
        };
        let value = serde_json::to_value(&media).unwrap();
        assert_eq!(value["kind"]["type"], "media_open_ended");
        assert_eq!(value["kind"]["media"]["kind"], "audio");
        assert!(!media.is_auto_scored());
        assert!(media.options().is_empty());
    }

    #[test]
    fn entity_index_is_clamped_into_question_range() {
        let now = SystemTime::now();
        let entity = QuizEntity {
            id: "abcd1234".into(),
            name: "Quiz".into(),
            host_id: "host".into(),
            phase: QuizPhase::Live,
            questions: vec![reorder()],
            current_question_index: 7,
            question_started_at: None,
            settled_questions: vec![],
            leaderboard_merged: false,
            created_at: now,
            updated_at: now,
        };

        let session = QuizSession::from(entity);
        assert_eq!(session.current_question_index, 0);
        assert!(session.is_last_question());
        assert_eq!(session.current_question().map(|q| q.id.as_str()), Some("q2"));
    }
}
