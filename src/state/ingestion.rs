use dashmap::DashSet;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::state::quiz::{ParticipantId, QuestionId, QuizId, QuizSession};

/// Host-side bookkeeping for answers flowing in from the store.
///
/// The arena maps every question of the active session to its prompt, so a late answer for an
/// earlier question still resolves. It is rebuilt whenever the active session changes. The
/// processed set guarantees a single oracle review per (question, participant).
#[derive(Default)]
pub struct IngestionGuard {
    arena: RwLock<QuestionArena>,
    processed: DashSet<(QuestionId, ParticipantId)>,
}

#[derive(Default)]
struct QuestionArena {
    quiz_id: Option<QuizId>,
    questions: IndexMap<QuestionId, String>,
}

impl IngestionGuard {
    /// Track the questions of `session`, or nothing at all.
    ///
    /// Switching to another session also forgets which answers were processed.
    pub async fn rebuild(&self, session: Option<&QuizSession>) {
        let mut arena = self.arena.write().await;
        let next_id = session.map(|s| s.id.clone());
        if arena.quiz_id != next_id {
            self.processed.clear();
        }

        arena.quiz_id = next_id;
        arena.questions = session
            .map(|s| {
                s.questions
                    .iter()
                    .map(|q| (q.id.clone(), q.text.clone()))
                    .collect()
            })
            .unwrap_or_default();
    }

    /// Forget processed answers while keeping the arena; used when a session is replayed.
    pub fn reset_processed(&self) {
        self.processed.clear();
    }

    /// Prompt of `question_id` when it belongs to the tracked session `quiz_id`.
    pub async fn question_text(&self, quiz_id: &str, question_id: &str) -> Option<String> {
        let arena = self.arena.read().await;
        if arena.quiz_id.as_deref() != Some(quiz_id) {
            return None;
        }
        arena.questions.get(question_id).cloned()
    }

    /// Mark the pair as processed; false when it already was.
    pub fn claim(&self, question_id: &str, participant_id: &str) -> bool {
        self.processed
            .insert((question_id.to_owned(), participant_id.to_owned()))
    }

    /// The tracked session and its question ids, in authoring order.
    pub async fn tracked_session(&self) -> Option<(QuizId, Vec<QuestionId>)> {
        let arena = self.arena.read().await;
        let quiz_id = arena.quiz_id.clone()?;
        Some((quiz_id, arena.questions.keys().cloned().collect()))
    }

    /// Number of tracked questions.
    pub async fn tracked_questions(&self) -> usize {
        self.arena.read().await.questions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::quiz::{Question, QuestionKind};

    fn session(id: &str) -> QuizSession {
        let now = SystemTime::now();
        QuizSession {
            id: id.into(),
            name: "Quiz".into(),
            host_id: "host".into(),
            questions: vec![Question {
                id: "q1".into(),
                text: "What is the capital of France?".into(),
                kind: QuestionKind::OpenEnded {
                    correct_answer: "Paris".into(),
                },
            }],
            current_question_index: 0,
            question_started_at: None,
            settled_questions: vec![],
            leaderboard_merged: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn claims_are_single_use_until_the_session_changes() {
        let guard = IngestionGuard::default();
        guard.rebuild(Some(&session("aaaa1111"))).await;

        assert!(guard.claim("q1", "p1"));
        assert!(!guard.claim("q1", "p1"));
        assert!(guard.claim("q1", "p2"));

        guard.rebuild(Some(&session("aaaa1111"))).await;
        assert!(!guard.claim("q1", "p1"));

        guard.rebuild(Some(&session("bbbb2222"))).await;
        assert!(guard.claim("q1", "p1"));
    }

    #[tokio::test]
    async fn question_text_is_scoped_to_the_tracked_session() {
        let guard = IngestionGuard::default();
        guard.rebuild(Some(&session("aaaa1111"))).await;

        assert_eq!(
            guard.question_text("aaaa1111", "q1").await.as_deref(),
            Some("What is the capital of France?")
        );
        assert!(guard.question_text("other", "q1").await.is_none());

        guard.rebuild(None).await;
        assert_eq!(guard.tracked_questions().await, 0);
        assert!(guard.tracked_session().await.is_none());
    }

    #[tokio::test]
    async fn tracked_session_lists_question_ids() {
        let guard = IngestionGuard::default();
        guard.rebuild(Some(&session("aaaa1111"))).await;

        let (quiz_id, questions) = guard.tracked_session().await.unwrap();
        assert_eq!(quiz_id, "aaaa1111");
        assert_eq!(questions, vec!["q1".to_string()]);
    }
}
