//! In-process store used when no database is configured and by the test-suite.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};

use super::{AnswerKey, JoinOutcome, QuizStore};
use crate::{
    dao::{
        models::{
            AnswerEntity, HostRole, LeaderboardContribution, LeaderboardEntryEntity,
            ParticipantEntity, ProfileEntity, QuizEntity, ScoreIncrement, SettingsEntity,
            StoreEvent,
        },
        storage::{StorageError, StorageResult},
    },
    state::quiz::{ParticipantId, QuestionId, QuizId},
};

const EVENT_CAPACITY: usize = 256;

/// Failures raised by the in-memory backend.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The store was switched offline.
    #[error("in-memory store is offline")]
    Offline,
    /// The referenced session does not exist.
    #[error("quiz `{0}` does not exist")]
    MissingQuiz(QuizId),
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

#[derive(Default)]
struct Tables {
    quizzes: HashMap<QuizId, QuizEntity>,
    participants: HashMap<(QuizId, ParticipantId), ParticipantEntity>,
    answers: HashMap<AnswerKey, AnswerEntity>,
    leaderboard: HashMap<(String, String), LeaderboardEntryEntity>,
    profiles: HashMap<String, ProfileEntity>,
    hosts: HashMap<String, HostRole>,
    settings: Option<SettingsEntity>,
}

/// Store keeping every collection in a single mutex so batches are trivially atomic.
#[derive(Clone)]
pub struct MemoryQuizStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: Mutex<Tables>,
    events: broadcast::Sender<StoreEvent>,
    offline: AtomicBool,
}

impl Default for MemoryQuizStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQuizStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                tables: Mutex::new(Tables::default()),
                events,
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Simulate an outage: every call fails until switched back online.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), MemoryStoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(MemoryStoreError::Offline)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.inner.events.send(event);
    }

    fn emit_answer(&self, key: &AnswerKey) {
        self.emit(StoreEvent::AnswerWritten {
            quiz_id: key.quiz_id.clone(),
            question_id: key.question_id.clone(),
            participant_id: key.participant_id.clone(),
        });
    }

    async fn join(&self, participant: ParticipantEntity) -> Result<JoinOutcome, MemoryStoreError> {
        self.ensure_online()?;
        let mut tables = self.inner.tables.lock().await;
        let key = (participant.quiz_id.clone(), participant.id.clone());
        if let Some(existing) = tables.participants.get(&key) {
            return Ok(JoinOutcome {
                participant: existing.clone(),
                created: false,
            });
        }
        tables.participants.insert(key, participant.clone());
        Ok(JoinOutcome {
            participant,
            created: true,
        })
    }

    async fn create_answer(&self, answer: AnswerEntity) -> Result<bool, MemoryStoreError> {
        self.ensure_online()?;
        let key = AnswerKey::of(&answer);
        let created = {
            let mut tables = self.inner.tables.lock().await;
            if tables.answers.contains_key(&key) {
                false
            } else {
                tables.answers.insert(key.clone(), answer);
                true
            }
        };
        // Snapshot listeners see every write, duplicates included.
        self.emit_answer(&key);
        Ok(created)
    }

    async fn commit_settlement(
        &self,
        quiz_id: QuizId,
        question_id: QuestionId,
        increments: Vec<ScoreIncrement>,
    ) -> Result<bool, MemoryStoreError> {
        self.ensure_online()?;
        let mut guard = self.inner.tables.lock().await;
        let tables = &mut *guard;
        let quiz = tables
            .quizzes
            .get_mut(&quiz_id)
            .ok_or_else(|| MemoryStoreError::MissingQuiz(quiz_id.clone()))?;
        if quiz.settled_questions.contains(&question_id) {
            return Ok(false);
        }
        quiz.settled_questions.push(question_id);

        for increment in increments {
            if let Some(participant) = tables
                .participants
                .get_mut(&(quiz_id.clone(), increment.participant_id))
            {
                participant.score += increment.delta;
            }
        }
        Ok(true)
    }

    async fn reset_session(&self, quiz_id: QuizId) -> Result<(), MemoryStoreError> {
        self.ensure_online()?;
        let mut guard = self.inner.tables.lock().await;
        let tables = &mut *guard;
        let quiz = tables
            .quizzes
            .get_mut(&quiz_id)
            .ok_or_else(|| MemoryStoreError::MissingQuiz(quiz_id.clone()))?;
        quiz.settled_questions.clear();
        tables
            .participants
            .values_mut()
            .filter(|participant| participant.quiz_id == quiz_id)
            .for_each(|participant| participant.score = 0);
        tables.answers.retain(|key, _| key.quiz_id != quiz_id);
        Ok(())
    }

    async fn merge_leaderboard(
        &self,
        quiz_id: QuizId,
        month: String,
        contributions: Vec<LeaderboardContribution>,
    ) -> Result<bool, MemoryStoreError> {
        self.ensure_online()?;
        let mut guard = self.inner.tables.lock().await;
        let tables = &mut *guard;
        let quiz = tables
            .quizzes
            .get_mut(&quiz_id)
            .ok_or_else(|| MemoryStoreError::MissingQuiz(quiz_id.clone()))?;
        if quiz.leaderboard_merged {
            return Ok(false);
        }
        quiz.leaderboard_merged = true;

        for contribution in contributions {
            let entry = tables
                .leaderboard
                .entry((month.clone(), contribution.name.clone()))
                .or_insert_with(|| LeaderboardEntryEntity {
                    month: month.clone(),
                    name: contribution.name.clone(),
                    avatar: contribution.avatar.clone(),
                    monthly_score: 0,
                });
            entry.monthly_score += contribution.points;
            entry.avatar = contribution.avatar.clone();

            let profile = tables
                .profiles
                .entry(contribution.participant_id.clone())
                .or_insert_with(|| ProfileEntity {
                    user_id: contribution.participant_id.clone(),
                    nickname: contribution.name.clone(),
                    icon: contribution.avatar.clone(),
                    jolly_available: true,
                    monthly_quizzes_played: 0,
                    counters_month: month.clone(),
                });
            profile.roll_to(&month);
            profile.monthly_quizzes_played += 1;
        }

        let settings = tables.settings.get_or_insert_with(SettingsEntity::default);
        settings.roll_to(&month);
        settings.total_quizzes_held += 1;
        Ok(true)
    }

    async fn activate_jolly(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
        month: String,
    ) -> Result<bool, MemoryStoreError> {
        self.ensure_online()?;
        let mut tables = self.inner.tables.lock().await;
        let Tables {
            participants,
            profiles,
            ..
        } = &mut *tables;

        let Some(participant) = participants.get_mut(&(quiz_id, participant_id.clone())) else {
            return Ok(false);
        };
        let Some(profile) = profiles.get_mut(&participant_id) else {
            return Ok(false);
        };
        if participant.jolly_active || !profile.jolly_available_in(&month) {
            return Ok(false);
        }

        profile.roll_to(&month);
        participant.jolly_active = true;
        participant.jolly_available = false;
        profile.jolly_available = false;
        Ok(true)
    }
}

fn ready<T: Send + 'static>(
    result: Result<T, MemoryStoreError>,
) -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(async move { result.map_err(Into::into) })
}

impl QuizStore for MemoryQuizStore {
    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.lock().await;
            tables.quizzes.insert(quiz.id.clone(), quiz);
            Ok(())
        })
    }

    fn find_quiz(&self, id: QuizId) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.lock().await;
            Ok(tables.quizzes.get(&id).cloned())
        })
    }

    fn delete_quiz(&self, id: QuizId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let removed = {
                let mut tables = store.inner.tables.lock().await;
                tables.participants.retain(|(quiz_id, _), _| *quiz_id != id);
                tables.answers.retain(|key, _| key.quiz_id != id);
                tables.quizzes.remove(&id).is_some()
            };
            if removed {
                store.emit(StoreEvent::QuizDeleted { quiz_id: id });
            }
            Ok(removed)
        })
    }

    fn join_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<JoinOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.join(participant).await.map_err(Into::into) })
    }

    fn find_participant(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.lock().await;
            Ok(tables.participants.get(&(quiz_id, participant_id)).cloned())
        })
    }

    fn list_participants(
        &self,
        quiz_id: QuizId,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.lock().await;
            let mut participants: Vec<_> = tables
                .participants
                .values()
                .filter(|participant| participant.quiz_id == quiz_id)
                .cloned()
                .collect();
            participants.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
            Ok(participants)
        })
    }

    fn create_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create_answer(answer).await.map_err(Into::into) })
    }

    fn find_answer(&self, key: AnswerKey) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.lock().await;
            Ok(tables.answers.get(&key).cloned())
        })
    }

    fn list_answers(
        &self,
        quiz_id: QuizId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.lock().await;
            Ok(tables
                .answers
                .values()
                .filter(|answer| answer.quiz_id == quiz_id && answer.question_id == question_id)
                .cloned()
                .collect())
        })
    }

    fn set_answer_score(
        &self,
        key: AnswerKey,
        score: i64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let found = {
                let mut tables = store.inner.tables.lock().await;
                match tables.answers.get_mut(&key) {
                    Some(answer) => {
                        answer.score = score;
                        true
                    }
                    None => false,
                }
            };
            if found {
                store.emit_answer(&key);
            }
            Ok(found)
        })
    }

    fn annotate_answer(
        &self,
        key: AnswerKey,
        is_cheating: bool,
        reason: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let found = {
                let mut tables = store.inner.tables.lock().await;
                match tables.answers.get_mut(&key) {
                    Some(answer) => {
                        answer.is_cheating = Some(is_cheating);
                        answer.cheating_reason = Some(reason);
                        true
                    }
                    None => false,
                }
            };
            if found {
                store.emit_answer(&key);
            }
            Ok(())
        })
    }

    fn commit_settlement(
        &self,
        quiz_id: QuizId,
        question_id: QuestionId,
        increments: Vec<ScoreIncrement>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .commit_settlement(quiz_id, question_id, increments)
                .await
                .map_err(Into::into)
        })
    }

    fn reset_session(&self, quiz_id: QuizId) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.reset_session(quiz_id).await.map_err(Into::into) })
    }

    fn merge_leaderboard(
        &self,
        quiz_id: QuizId,
        month: String,
        contributions: Vec<LeaderboardContribution>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .merge_leaderboard(quiz_id, month, contributions)
                .await
                .map_err(Into::into)
        })
    }

    fn list_leaderboard(
        &self,
        month: String,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.lock().await;
            Ok(tables
                .leaderboard
                .values()
                .filter(|entry| entry.month == month)
                .cloned()
                .collect())
        })
    }

    fn clear_leaderboard(&self, month: String) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut guard = store.inner.tables.lock().await;
            let tables = &mut *guard;
            let before = tables.leaderboard.len();
            tables.leaderboard.retain(|(entry_month, _), _| *entry_month != month);

            tables
                .profiles
                .values_mut()
                .filter(|profile| profile.counters_month == month)
                .for_each(|profile| profile.monthly_quizzes_played = 0);
            if let Some(settings) = tables
                .settings
                .as_mut()
                .filter(|settings| settings.held_month == month)
            {
                settings.total_quizzes_held = 0;
            }
            Ok((before - tables.leaderboard.len()) as u64)
        })
    }

    fn activate_jolly(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
        month: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .activate_jolly(quiz_id, participant_id, month)
                .await
                .map_err(Into::into)
        })
    }

    fn find_profile(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.lock().await;
            Ok(tables.profiles.get(&user_id).cloned())
        })
    }

    fn save_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.lock().await;
            tables.profiles.insert(profile.user_id.clone(), profile);
            Ok(())
        })
    }

    fn find_host_role(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<HostRole>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.lock().await;
            Ok(tables.hosts.get(&user_id).copied())
        })
    }

    fn save_host_role(
        &self,
        user_id: String,
        role: HostRole,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.lock().await;
            tables.hosts.insert(user_id, role);
            Ok(())
        })
    }

    fn find_settings(&self) -> BoxFuture<'static, StorageResult<SettingsEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.inner.tables.lock().await;
            Ok(tables.settings.clone().unwrap_or_default())
        })
    }

    fn save_settings(&self, settings: SettingsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.inner.tables.lock().await;
            let current = tables.settings.get_or_insert_with(SettingsEntity::default);
            current.rules_text = settings.rules_text;
            current.jolly_enabled = settings.jolly_enabled;
            Ok(())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(self.ensure_online())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(self.ensure_online())
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::state_machine::QuizPhase;

    fn quiz(id: &str) -> QuizEntity {
        let now = SystemTime::now();
        QuizEntity {
            id: id.into(),
            name: "Quiz".into(),
            host_id: "host".into(),
            phase: QuizPhase::Lobby,
            questions: vec![],
            current_question_index: 0,
            question_started_at: None,
            settled_questions: vec![],
            leaderboard_merged: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn participant(quiz_id: &str, id: &str, name: &str) -> ParticipantEntity {
        ParticipantEntity {
            quiz_id: quiz_id.into(),
            id: id.into(),
            name: name.into(),
            avatar: format!("https://avatars.example/{id}.png"),
            score: 0,
            jolly_active: false,
            jolly_available: true,
            joined_at: SystemTime::now(),
        }
    }

    fn answer(quiz_id: &str, question_id: &str, participant_id: &str, text: &str) -> AnswerEntity {
        AnswerEntity {
            quiz_id: quiz_id.into(),
            question_id: question_id.into(),
            participant_id: participant_id.into(),
            answer_text: text.into(),
            answer_order: None,
            response_time: 1.5,
            score: 10,
            is_cheating: None,
            cheating_reason: None,
            submitted_at: SystemTime::now(),
        }
    }

    fn contribution(id: &str, name: &str, points: i64) -> LeaderboardContribution {
        LeaderboardContribution {
            participant_id: id.into(),
            name: name.into(),
            avatar: String::new(),
            points,
        }
    }

    #[tokio::test]
    async fn join_twice_keeps_first_record() {
        let store = MemoryQuizStore::new();
        let first = store
            .join_participant(participant("q", "p1", "Ada"))
            .await
            .unwrap();
        assert!(first.created);

        let mut renamed = participant("q", "p1", "Someone else");
        renamed.score = 99;
        let second = store.join_participant(renamed).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.participant.name, "Ada");
        assert_eq!(second.participant.score, 0);
        assert_eq!(store.list_participants("q".into()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn answers_are_write_once_but_always_notify() {
        let store = MemoryQuizStore::new();
        let mut events = store.subscribe();

        assert!(store.create_answer(answer("q", "q1", "p1", "Paris")).await.unwrap());
        assert!(!store.create_answer(answer("q", "q1", "p1", "Rome")).await.unwrap());

        let stored = store
            .find_answer(AnswerKey::new("q", "q1", "p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.answer_text, "Paris");

        assert!(matches!(events.try_recv(), Ok(StoreEvent::AnswerWritten { .. })));
        assert!(matches!(events.try_recv(), Ok(StoreEvent::AnswerWritten { .. })));
    }

    #[tokio::test]
    async fn settlement_applies_once_per_question() {
        let store = MemoryQuizStore::new();
        store.save_quiz(quiz("q")).await.unwrap();
        store.join_participant(participant("q", "p1", "Ada")).await.unwrap();

        let increments = vec![ScoreIncrement {
            participant_id: "p1".into(),
            delta: 10,
        }];
        assert!(
            store
                .commit_settlement("q".into(), "q1".into(), increments.clone())
                .await
                .unwrap()
        );
        assert!(
            !store
                .commit_settlement("q".into(), "q1".into(), increments)
                .await
                .unwrap()
        );

        let stored = store.find_participant("q".into(), "p1".into()).await.unwrap().unwrap();
        assert_eq!(stored.score, 10);
    }

    #[tokio::test]
    async fn offline_store_rejects_batches_without_partial_writes() {
        let store = MemoryQuizStore::new();
        store.save_quiz(quiz("q")).await.unwrap();
        store.join_participant(participant("q", "p1", "Ada")).await.unwrap();
        store.set_offline(true);

        let result = store
            .commit_settlement(
                "q".into(),
                "q1".into(),
                vec![ScoreIncrement {
                    participant_id: "p1".into(),
                    delta: 10,
                }],
            )
            .await;
        assert!(result.is_err());
        assert!(store.health_check().await.is_err());

        store.set_offline(false);
        let stored = store.find_quiz("q".into()).await.unwrap().unwrap();
        assert!(stored.settled_questions.is_empty());
    }

    #[tokio::test]
    async fn leaderboard_merge_order_does_not_matter() {
        let a_then_b = MemoryQuizStore::new();
        let b_then_a = MemoryQuizStore::new();
        for store in [&a_then_b, &b_then_a] {
            store.save_quiz(quiz("a")).await.unwrap();
            store.save_quiz(quiz("b")).await.unwrap();
        }
        let session_a = vec![contribution("p1", "Ada", 20), contribution("p2", "Bob", 10)];
        let session_b = vec![contribution("p1", "Ada", 5), contribution("p3", "Cy", 30)];

        a_then_b
            .merge_leaderboard("a".into(), "2026-10".into(), session_a.clone())
            .await
            .unwrap();
        a_then_b
            .merge_leaderboard("b".into(), "2026-10".into(), session_b.clone())
            .await
            .unwrap();
        b_then_a
            .merge_leaderboard("b".into(), "2026-10".into(), session_b)
            .await
            .unwrap();
        b_then_a
            .merge_leaderboard("a".into(), "2026-10".into(), session_a)
            .await
            .unwrap();

        let mut left = a_then_b.list_leaderboard("2026-10".into()).await.unwrap();
        let mut right = b_then_a.list_leaderboard("2026-10".into()).await.unwrap();
        left.sort_by(|x, y| x.name.cmp(&y.name));
        right.sort_by(|x, y| x.name.cmp(&y.name));
        assert_eq!(left, right);
        assert_eq!(left[0].monthly_score, 25);
        let settings = a_then_b.find_settings().await.unwrap();
        assert_eq!(settings.quizzes_held_in("2026-10"), 2);
    }

    #[tokio::test]
    async fn merged_session_is_not_merged_twice() {
        let store = MemoryQuizStore::new();
        store.save_quiz(quiz("a")).await.unwrap();
        let batch = vec![contribution("p1", "Ada", 20)];
        assert!(
            store
                .merge_leaderboard("a".into(), "2026-10".into(), batch.clone())
                .await
                .unwrap()
        );
        assert!(
            !store
                .merge_leaderboard("a".into(), "2026-10".into(), batch)
                .await
                .unwrap()
        );
        let entries = store.list_leaderboard("2026-10".into()).await.unwrap();
        assert_eq!(entries[0].monthly_score, 20);
        let profile = store.find_profile("p1".into()).await.unwrap().unwrap();
        assert_eq!(profile.quizzes_played_in("2026-10"), 1);
    }

    #[tokio::test]
    async fn attendance_counters_start_over_each_month() {
        let store = MemoryQuizStore::new();
        store.save_quiz(quiz("sept")).await.unwrap();
        store.save_quiz(quiz("oct")).await.unwrap();
        store
            .merge_leaderboard("sept".into(), "2026-09".into(), vec![contribution("p1", "Ada", 20)])
            .await
            .unwrap();
        store
            .merge_leaderboard("oct".into(), "2026-10".into(), vec![contribution("p2", "Bob", 5)])
            .await
            .unwrap();

        let settings = store.find_settings().await.unwrap();
        assert_eq!(settings.quizzes_held_in("2026-10"), 1);
        assert_eq!(settings.quizzes_held_in("2026-09"), 0);
        let ada = store.find_profile("p1".into()).await.unwrap().unwrap();
        assert_eq!(ada.quizzes_played_in("2026-10"), 0);
        let bob = store.find_profile("p2".into()).await.unwrap().unwrap();
        assert_eq!(bob.quizzes_played_in("2026-10"), 1);
    }

    #[tokio::test]
    async fn clearing_a_month_zeroes_its_counters() {
        let store = MemoryQuizStore::new();
        store.save_quiz(quiz("a")).await.unwrap();
        store
            .merge_leaderboard("a".into(), "2026-10".into(), vec![contribution("p1", "Ada", 20)])
            .await
            .unwrap();

        assert_eq!(store.clear_leaderboard("2026-10".into()).await.unwrap(), 1);
        assert!(store.list_leaderboard("2026-10".into()).await.unwrap().is_empty());
        let settings = store.find_settings().await.unwrap();
        assert_eq!(settings.quizzes_held_in("2026-10"), 0);
        let profile = store.find_profile("p1".into()).await.unwrap().unwrap();
        assert_eq!(profile.quizzes_played_in("2026-10"), 0);
    }

    #[tokio::test]
    async fn jolly_consumes_profile_token_once() {
        let store = MemoryQuizStore::new();
        store.join_participant(participant("q", "p1", "Ada")).await.unwrap();
        store
            .save_profile(ProfileEntity {
                user_id: "p1".into(),
                nickname: "Ada".into(),
                icon: String::new(),
                jolly_available: true,
                monthly_quizzes_played: 0,
                counters_month: "2026-10".into(),
            })
            .await
            .unwrap();

        assert!(store.activate_jolly("q".into(), "p1".into(), "2026-10".into()).await.unwrap());
        assert!(!store.activate_jolly("q".into(), "p1".into(), "2026-10".into()).await.unwrap());

        let participant = store.find_participant("q".into(), "p1".into()).await.unwrap().unwrap();
        assert!(participant.jolly_active);
        assert!(!participant.jolly_available);
        let profile = store.find_profile("p1".into()).await.unwrap().unwrap();
        assert!(!profile.jolly_available_in("2026-10"));
    }

    #[tokio::test]
    async fn a_new_month_hands_out_a_fresh_token() {
        let store = MemoryQuizStore::new();
        store.join_participant(participant("q", "p1", "Ada")).await.unwrap();
        store
            .save_profile(ProfileEntity {
                user_id: "p1".into(),
                nickname: "Ada".into(),
                icon: String::new(),
                jolly_available: false,
                monthly_quizzes_played: 3,
                counters_month: "2026-09".into(),
            })
            .await
            .unwrap();

        assert!(store.activate_jolly("q".into(), "p1".into(), "2026-10".into()).await.unwrap());
        let profile = store.find_profile("p1".into()).await.unwrap().unwrap();
        assert_eq!(profile.counters_month, "2026-10");
        assert_eq!(profile.monthly_quizzes_played, 0);
        assert!(!profile.jolly_available);
    }

    #[tokio::test]
    async fn delete_cascades_and_notifies() {
        let store = MemoryQuizStore::new();
        let mut events = store.subscribe();
        store.save_quiz(quiz("q")).await.unwrap();
        store.join_participant(participant("q", "p1", "Ada")).await.unwrap();

        assert!(store.delete_quiz("q".into()).await.unwrap());
        assert!(store.list_participants("q".into()).await.unwrap().is_empty());
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::QuizDeleted {
                quiz_id: "q".into()
            }
        );
    }
}
