//! Host-local authoring state and its scratch-file persistence.

use std::{
    io::{self, ErrorKind},
    path::PathBuf,
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::quiz::{Question, QuestionKind, QuizId, QuizSession};

/// Name given to a fresh draft.
pub const DEFAULT_DRAFT_NAME: &str = "Il Mio Quiz Fantastico";

/// Unpublished quiz owned by the host. Nothing in here is visible to participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Display name of the quiz to publish.
    pub name: String,
    /// Questions in authored order.
    pub questions: Vec<Question>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            name: DEFAULT_DRAFT_NAME.into(),
            questions: Vec::new(),
        }
    }
}

impl Draft {
    /// Rename the draft; blank names are ignored.
    pub fn rename(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || name == self.name {
            return false;
        }
        self.name = name.to_owned();
        true
    }

    /// Append a question and return it with its freshly assigned identifier.
    pub fn add_question(&mut self, text: String, kind: QuestionKind) -> &Question {
        let question = Question {
            id: Uuid::new_v4().simple().to_string(),
            text,
            kind,
        };
        let index = self.questions.len();
        self.questions.push(question);
        &self.questions[index]
    }

    /// Drop a question; returns false when it was not part of the draft.
    pub fn remove_question(&mut self, question_id: &str) -> bool {
        let before = self.questions.len();
        self.questions.retain(|question| question.id != question_id);
        self.questions.len() != before
    }

    /// Turn the draft into a shared session. `None` while the draft has no question.
    pub fn publish(&self, host_id: &str, now: SystemTime) -> Option<QuizSession> {
        if self.questions.is_empty() {
            return None;
        }

        Some(QuizSession {
            id: new_session_id(),
            name: self.name.clone(),
            host_id: host_id.to_owned(),
            questions: self.questions.clone(),
            current_question_index: 0,
            question_started_at: None,
            settled_questions: Vec::new(),
            leaderboard_merged: false,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Short invite-friendly identifier: the first 8 characters of a v4 UUID.
pub fn new_session_id() -> QuizId {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// What survives a host restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchContents {
    /// Draft being authored.
    #[serde(default)]
    pub draft: Draft,
    /// Published session the host was driving, if any.
    #[serde(default)]
    pub active_quiz_id: Option<QuizId>,
}

/// Failures while writing the scratch file.
#[derive(Debug, Error)]
pub enum ScratchError {
    /// Filesystem failure.
    #[error("failed to write scratch file `{path}`")]
    Io {
        /// Target file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Serialization failure.
    #[error("failed to encode scratch contents")]
    Encode(#[source] serde_json::Error),
}

/// JSON file on the host machine holding [`ScratchContents`].
#[derive(Debug, Clone)]
pub struct HostScratch {
    path: PathBuf,
}

impl HostScratch {
    /// Scratch storage at `path`; the file is created on first save.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the scratch file, starting fresh when it is missing or unreadable.
    pub fn load(&self) -> ScratchContents {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(scratch) => {
                    info!(path = %self.path.display(), "restored host draft");
                    scratch
                }
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "ignoring corrupt host scratch file");
                    ScratchContents::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => ScratchContents::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read host scratch file");
                ScratchContents::default()
            }
        }
    }

    /// Overwrite the scratch file.
    pub async fn save(&self, contents: &ScratchContents) -> Result<(), ScratchError> {
        let encoded = serde_json::to_vec_pretty(contents).map_err(ScratchError::Encode)?;
        let io_err = |source| ScratchError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&self.path, encoded).await.map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(answer: &str) -> QuestionKind {
        QuestionKind::MultipleChoice {
            options: vec!["Paris".into(), "Rome".into()],
            correct_answer: answer.into(),
        }
    }

    #[test]
    fn empty_draft_cannot_be_published() {
        let draft = Draft::default();
        assert_eq!(draft.name, DEFAULT_DRAFT_NAME);
        assert!(draft.publish("host", SystemTime::now()).is_none());
    }

    #[test]
    fn publish_freezes_questions_under_a_short_id() {
        let mut draft = Draft::default();
        let first = draft
            .add_question("What is the capital of France?".into(), choice("Paris"))
            .id
            .clone();
        draft.add_question("Which city hosts the Colosseum?".into(), choice("Rome"));
        assert!(draft.remove_question(&first));
        assert!(!draft.remove_question(&first));
        assert!(draft.rename("  Friday quiz "));
        assert!(!draft.rename("   "));

        let session = draft.publish("host-1", SystemTime::now()).unwrap();
        assert_eq!(session.id.len(), 8);
        assert_eq!(session.name, "Friday quiz");
        assert_eq!(session.host_id, "host-1");
        assert_eq!(session.questions, draft.questions);
        assert_eq!(session.current_question_index, 0);
    }

    #[tokio::test]
    async fn scratch_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!("quiz-scratch-{}.json", Uuid::new_v4()));
        let scratch = HostScratch::new(path.clone());
        assert_eq!(scratch.load(), ScratchContents::default());

        let mut contents = ScratchContents::default();
        contents.draft.add_question("Who painted the Mona Lisa?".into(), choice("Paris"));
        contents.active_quiz_id = Some("abcd1234".into());
        scratch.save(&contents).await.unwrap();

        assert_eq!(scratch.load(), contents);
        let _ = std::fs::remove_file(path);
    }
}
