use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    ClientSession, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoAnswerDocument, MongoHostDocument, MongoLeaderboardDocument,
        MongoParticipantDocument, MongoProfileDocument, MongoQuizDocument, MongoSettingsDocument,
        SETTINGS_ID, answer_doc_id, answer_insert_fields, doc_id, leaderboard_doc_id,
        participant_doc_id, participant_insert_fields, roll_profile, stale_month,
    },
};
use crate::{
    dao::{
        models::{
            AnswerEntity, HostRole, LeaderboardContribution, LeaderboardEntryEntity,
            ParticipantEntity, ProfileEntity, QuizEntity, ScoreIncrement, SettingsEntity,
            StoreEvent,
        },
        quiz_store::{AnswerKey, JoinOutcome, QuizStore},
        storage::StorageResult,
    },
    state::quiz::{ParticipantId, QuestionId, QuizId},
};

const QUIZZES: &str = "quizzes";
const PARTICIPANTS: &str = "participants";
const ANSWERS: &str = "answers";
const LEADERBOARD: &str = "monthly_rankings";
const PROFILES: &str = "profiles";
const HOSTS: &str = "hosts";
const SETTINGS: &str = "settings";
const EVENT_CAPACITY: usize = 256;

/// MongoDB-backed quiz store. Multi-document writes run inside transactions, which requires a
/// replica set deployment.
#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    events: broadcast::Sender<StoreEvent>,
}

struct MongoState {
    client: mongodb::Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn read_err(collection: &'static str) -> impl FnOnce(mongodb::error::Error) -> MongoDaoError {
    move |source| MongoDaoError::Read { collection, source }
}

fn write_err(collection: &'static str) -> impl FnOnce(mongodb::error::Error) -> MongoDaoError {
    move |source| MongoDaoError::Write { collection, source }
}

fn tx_err(operation: &'static str) -> impl FnOnce(mongodb::error::Error) -> MongoDaoError {
    move |source| MongoDaoError::Transaction { operation, source }
}

async fn abort(session: &mut ClientSession, operation: &'static str) {
    if let Err(err) = session.abort_transaction().await {
        debug!(operation, error = %err, "failed to abort MongoDB transaction");
    }
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
            events,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, Document); 3] = [
            (PARTICIPANTS, "quiz_id", doc! {"quiz_id": 1, "joined_at": 1}),
            (ANSWERS, "quiz_id,question_id", doc! {"quiz_id": 1, "question_id": 1}),
            (LEADERBOARD, "month", doc! {"month": 1, "monthly_score": -1}),
        ];

        for (collection, index, keys) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_{}_idx", index.replace(',', "_"))))
                        .build(),
                )
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn start_transaction(&self, operation: &'static str) -> MongoResult<ClientSession> {
        let client = {
            let guard = self.inner.state.read().await;
            guard.client.clone()
        };
        let mut session = client.start_session().await.map_err(tx_err(operation))?;
        session
            .start_transaction()
            .await
            .map_err(tx_err(operation))?;
        Ok(session)
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

    async fn save_quiz(&self, quiz: QuizEntity) -> MongoResult<()> {
        let id = quiz.id.clone();
        let document: MongoQuizDocument = quiz.into();
        self.collection::<MongoQuizDocument>(QUIZZES)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(write_err(QUIZZES))?;
        Ok(())
    }

    async fn find_quiz(&self, id: QuizId) -> MongoResult<Option<QuizEntity>> {
        let document = self
            .collection::<MongoQuizDocument>(QUIZZES)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(read_err(QUIZZES))?;
        Ok(document.map(Into::into))
    }

    async fn delete_quiz(&self, id: QuizId) -> MongoResult<bool> {
        const OPERATION: &str = "delete_quiz";
        let quizzes = self.collection::<Document>(QUIZZES).await;
        let participants = self.collection::<Document>(PARTICIPANTS).await;
        let answers = self.collection::<Document>(ANSWERS).await;
        let mut session = self.start_transaction(OPERATION).await?;

        let result = async {
            participants
                .delete_many(doc! {"quiz_id": id.clone()})
                .session(&mut session)
                .await?;
            answers
                .delete_many(doc! {"quiz_id": id.clone()})
                .session(&mut session)
                .await?;
            quizzes
                .delete_one(doc_id(id.clone()))
                .session(&mut session)
                .await
        }
        .await;

        let deleted = match result {
            Ok(outcome) => outcome.deleted_count > 0,
            Err(err) => {
                abort(&mut session, OPERATION).await;
                return Err(tx_err(OPERATION)(err));
            }
        };
        session
            .commit_transaction()
            .await
            .map_err(tx_err(OPERATION))?;

        if deleted {
            self.emit(StoreEvent::QuizDeleted { quiz_id: id });
        }
        Ok(deleted)
    }

    async fn find_participant(
        &self,
        quiz_id: &str,
        participant_id: &str,
    ) -> MongoResult<Option<ParticipantEntity>> {
        let document = self
            .collection::<MongoParticipantDocument>(PARTICIPANTS)
            .await
            .find_one(doc_id(participant_doc_id(quiz_id, participant_id)))
            .await
            .map_err(read_err(PARTICIPANTS))?;
        Ok(document.map(Into::into))
    }

    async fn join_participant(&self, participant: ParticipantEntity) -> MongoResult<JoinOutcome> {
        let id = participant_doc_id(&participant.quiz_id, &participant.id);
        let result = self
            .collection::<Document>(PARTICIPANTS)
            .await
            .update_one(
                doc_id(id),
                doc! {"$setOnInsert": participant_insert_fields(&participant)},
            )
            .upsert(true)
            .await
            .map_err(write_err(PARTICIPANTS))?;

        if result.upserted_id.is_some() {
            return Ok(JoinOutcome {
                participant,
                created: true,
            });
        }

        let existing = self
            .find_participant(&participant.quiz_id, &participant.id)
            .await?
            .unwrap_or(participant);
        Ok(JoinOutcome {
            participant: existing,
            created: false,
        })
    }

    async fn list_participants(&self, quiz_id: QuizId) -> MongoResult<Vec<ParticipantEntity>> {
        let documents: Vec<MongoParticipantDocument> = self
            .collection::<MongoParticipantDocument>(PARTICIPANTS)
            .await
            .find(doc! {"quiz_id": quiz_id})
            .sort(doc! {"joined_at": 1})
            .await
            .map_err(read_err(PARTICIPANTS))?
            .try_collect()
            .await
            .map_err(read_err(PARTICIPANTS))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn create_answer(&self, answer: AnswerEntity) -> MongoResult<bool> {
        let key = AnswerKey::of(&answer);
        let result = self
            .collection::<Document>(ANSWERS)
            .await
            .update_one(
                doc_id(answer_doc_id(&key)),
                doc! {"$setOnInsert": answer_insert_fields(&answer)},
            )
            .upsert(true)
            .await
            .map_err(write_err(ANSWERS))?;
        self.emit_answer(&key);
        Ok(result.upserted_id.is_some())
    }

    async fn find_answer(&self, key: AnswerKey) -> MongoResult<Option<AnswerEntity>> {
        let document = self
            .collection::<MongoAnswerDocument>(ANSWERS)
            .await
            .find_one(doc_id(answer_doc_id(&key)))
            .await
            .map_err(read_err(ANSWERS))?;
        Ok(document.map(Into::into))
    }

    async fn list_answers(
        &self,
        quiz_id: QuizId,
        question_id: QuestionId,
    ) -> MongoResult<Vec<AnswerEntity>> {
        let documents: Vec<MongoAnswerDocument> = self
            .collection::<MongoAnswerDocument>(ANSWERS)
            .await
            .find(doc! {"quiz_id": quiz_id, "question_id": question_id})
            .await
            .map_err(read_err(ANSWERS))?
            .try_collect()
            .await
            .map_err(read_err(ANSWERS))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn update_answer(&self, key: AnswerKey, set: Document) -> MongoResult<bool> {
        let result = self
            .collection::<Document>(ANSWERS)
            .await
            .update_one(doc_id(answer_doc_id(&key)), doc! {"$set": set})
            .await
            .map_err(write_err(ANSWERS))?;
        let found = result.matched_count > 0;
        if found {
            self.emit_answer(&key);
        }
        Ok(found)
    }

    async fn commit_settlement(
        &self,
        quiz_id: QuizId,
        question_id: QuestionId,
        increments: Vec<ScoreIncrement>,
    ) -> MongoResult<bool> {
        const OPERATION: &str = "commit_settlement";
        let quizzes = self.collection::<Document>(QUIZZES).await;
        let participants = self.collection::<Document>(PARTICIPANTS).await;
        let mut session = self.start_transaction(OPERATION).await?;

        let result = async {
            let marked = quizzes
                .update_one(
                    doc! {"_id": quiz_id.clone(), "settled_questions": {"$ne": question_id.clone()}},
                    doc! {"$push": {"settled_questions": question_id.clone()}},
                )
                .session(&mut session)
                .await?;
            if marked.matched_count == 0 {
                return Ok(false);
            }

            for increment in &increments {
                participants
                    .update_one(
                        doc_id(participant_doc_id(&quiz_id, &increment.participant_id)),
                        doc! {"$inc": {"score": increment.delta}},
                    )
                    .session(&mut session)
                    .await?;
            }
            Ok::<_, mongodb::error::Error>(true)
        }
        .await;

        self.finish_transaction(session, OPERATION, result).await
    }

    async fn reset_session(&self, quiz_id: QuizId) -> MongoResult<()> {
        const OPERATION: &str = "reset_session";
        let quizzes = self.collection::<Document>(QUIZZES).await;
        let participants = self.collection::<Document>(PARTICIPANTS).await;
        let answers = self.collection::<Document>(ANSWERS).await;
        let mut session = self.start_transaction(OPERATION).await?;

        let result = async {
            quizzes
                .update_one(
                    doc_id(quiz_id.clone()),
                    doc! {"$set": {"settled_questions": []}},
                )
                .session(&mut session)
                .await?;
            participants
                .update_many(
                    doc! {"quiz_id": quiz_id.clone()},
                    doc! {"$set": {"score": 0_i64}},
                )
                .session(&mut session)
                .await?;
            answers
                .delete_many(doc! {"quiz_id": quiz_id.clone()})
                .session(&mut session)
                .await?;
            Ok::<_, mongodb::error::Error>(true)
        }
        .await;

        self.finish_transaction(session, OPERATION, result)
            .await
            .map(|_| ())
    }

    async fn merge_leaderboard(
        &self,
        quiz_id: QuizId,
        month: String,
        contributions: Vec<LeaderboardContribution>,
    ) -> MongoResult<bool> {
        const OPERATION: &str = "merge_leaderboard";
        let quizzes = self.collection::<Document>(QUIZZES).await;
        let leaderboard = self.collection::<Document>(LEADERBOARD).await;
        let profiles = self.collection::<Document>(PROFILES).await;
        let settings = self.collection::<Document>(SETTINGS).await;
        let mut session = self.start_transaction(OPERATION).await?;

        let result = async {
            let marked = quizzes
                .update_one(
                    doc! {"_id": quiz_id.clone(), "leaderboard_merged": {"$ne": true}},
                    doc! {"$set": {"leaderboard_merged": true}},
                )
                .session(&mut session)
                .await?;
            if marked.matched_count == 0 {
                return Ok(false);
            }

            for contribution in &contributions {
                leaderboard
                    .update_one(
                        doc_id(leaderboard_doc_id(&month, &contribution.name)),
                        doc! {
                            "$inc": {"monthly_score": contribution.points},
                            "$set": {"avatar": contribution.avatar.clone()},
                            "$setOnInsert": {"month": month.clone(), "name": contribution.name.clone()},
                        },
                    )
                    .upsert(true)
                    .session(&mut session)
                    .await?;
                profiles
                    .update_one(
                        stale_month(contribution.participant_id.clone(), "counters_month", &month),
                        roll_profile(&month),
                    )
                    .session(&mut session)
                    .await?;
                profiles
                    .update_one(
                        doc_id(contribution.participant_id.clone()),
                        doc! {
                            "$inc": {"monthly_quizzes_played": 1_i64},
                            "$setOnInsert": {
                                "nickname": contribution.name.clone(),
                                "icon": contribution.avatar.clone(),
                                "jolly_available": true,
                                "counters_month": month.clone(),
                            },
                        },
                    )
                    .upsert(true)
                    .session(&mut session)
                    .await?;
            }

            settings
                .update_one(
                    stale_month(SETTINGS_ID.to_owned(), "held_month", &month),
                    doc! {"$set": {"held_month": month.clone(), "total_quizzes_held": 0_i64}},
                )
                .session(&mut session)
                .await?;
            settings
                .update_one(
                    doc_id(SETTINGS_ID),
                    doc! {
                        "$inc": {"total_quizzes_held": 1_i64},
                        "$setOnInsert": {
                            "rules_text": "",
                            "jolly_enabled": true,
                            "held_month": month.clone(),
                        },
                    },
                )
                .upsert(true)
                .session(&mut session)
                .await?;
            Ok::<_, mongodb::error::Error>(true)
        }
        .await;

        self.finish_transaction(session, OPERATION, result).await
    }

    async fn activate_jolly(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
        month: String,
    ) -> MongoResult<bool> {
        const OPERATION: &str = "activate_jolly";
        let participants = self.collection::<Document>(PARTICIPANTS).await;
        let profiles = self.collection::<Document>(PROFILES).await;
        let mut session = self.start_transaction(OPERATION).await?;

        let result = async {
            let engaged = participants
                .update_one(
                    doc! {
                        "_id": participant_doc_id(&quiz_id, &participant_id),
                        "jolly_active": false,
                    },
                    doc! {"$set": {"jolly_active": true, "jolly_available": false}},
                )
                .session(&mut session)
                .await?;
            if engaged.matched_count == 0 {
                return Ok(false);
            }

            profiles
                .update_one(
                    stale_month(participant_id.clone(), "counters_month", &month),
                    roll_profile(&month),
                )
                .session(&mut session)
                .await?;
            let consumed = profiles
                .update_one(
                    doc! {"_id": participant_id.clone(), "jolly_available": true},
                    doc! {"$set": {"jolly_available": false}},
                )
                .session(&mut session)
                .await?;
            Ok::<_, mongodb::error::Error>(consumed.matched_count > 0)
        }
        .await;

        self.finish_transaction(session, OPERATION, result).await
    }

    /// Commit on `Ok(true)`, abort on `Ok(false)` or error.
    async fn finish_transaction(
        &self,
        mut session: ClientSession,
        operation: &'static str,
        result: Result<bool, mongodb::error::Error>,
    ) -> MongoResult<bool> {
        match result {
            Ok(true) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(tx_err(operation))?;
                Ok(true)
            }
            Ok(false) => {
                abort(&mut session, operation).await;
                Ok(false)
            }
            Err(err) => {
                abort(&mut session, operation).await;
                Err(tx_err(operation)(err))
            }
        }
    }

    async fn list_leaderboard(&self, month: String) -> MongoResult<Vec<LeaderboardEntryEntity>> {
        let documents: Vec<MongoLeaderboardDocument> = self
            .collection::<MongoLeaderboardDocument>(LEADERBOARD)
            .await
            .find(doc! {"month": month})
            .await
            .map_err(read_err(LEADERBOARD))?
            .try_collect()
            .await
            .map_err(read_err(LEADERBOARD))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn clear_leaderboard(&self, month: String) -> MongoResult<u64> {
        self.collection::<Document>(PROFILES)
            .await
            .update_many(
                doc! {"counters_month": month.clone()},
                doc! {"$set": {"monthly_quizzes_played": 0_i64}},
            )
            .await
            .map_err(write_err(PROFILES))?;
        self.collection::<Document>(SETTINGS)
            .await
            .update_one(
                doc! {"_id": SETTINGS_ID, "held_month": month.clone()},
                doc! {"$set": {"total_quizzes_held": 0_i64}},
            )
            .await
            .map_err(write_err(SETTINGS))?;

        let result = self
            .collection::<Document>(LEADERBOARD)
            .await
            .delete_many(doc! {"month": month})
            .await
            .map_err(write_err(LEADERBOARD))?;
        Ok(result.deleted_count)
    }

    async fn find_profile(&self, user_id: String) -> MongoResult<Option<ProfileEntity>> {
        let document = self
            .collection::<MongoProfileDocument>(PROFILES)
            .await
            .find_one(doc_id(user_id))
            .await
            .map_err(read_err(PROFILES))?;
        Ok(document.map(Into::into))
    }

    async fn save_profile(&self, profile: ProfileEntity) -> MongoResult<()> {
        let id = profile.user_id.clone();
        let document: MongoProfileDocument = profile.into();
        self.collection::<MongoProfileDocument>(PROFILES)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(write_err(PROFILES))?;
        Ok(())
    }

    async fn find_host_role(&self, user_id: String) -> MongoResult<Option<HostRole>> {
        let document = self
            .collection::<MongoHostDocument>(HOSTS)
            .await
            .find_one(doc_id(user_id))
            .await
            .map_err(read_err(HOSTS))?;
        Ok(document.map(|host| host.role))
    }

    async fn save_host_role(&self, user_id: String, role: HostRole) -> MongoResult<()> {
        let document = MongoHostDocument {
            id: user_id.clone(),
            role,
        };
        self.collection::<MongoHostDocument>(HOSTS)
            .await
            .replace_one(doc_id(user_id), &document)
            .upsert(true)
            .await
            .map_err(write_err(HOSTS))?;
        Ok(())
    }

    async fn find_settings(&self) -> MongoResult<SettingsEntity> {
        let document = self
            .collection::<MongoSettingsDocument>(SETTINGS)
            .await
            .find_one(doc_id(SETTINGS_ID))
            .await
            .map_err(read_err(SETTINGS))?;
        Ok(document.map(Into::into).unwrap_or_default())
    }

    async fn save_settings(&self, settings: SettingsEntity) -> MongoResult<()> {
        self.collection::<MongoSettingsDocument>(SETTINGS)
            .await
            .update_one(
                doc_id(SETTINGS_ID),
                doc! {
                    "$set": {
                        "rules_text": settings.rules_text,
                        "jolly_enabled": settings.jolly_enabled,
                    },
                    "$setOnInsert": {"total_quizzes_held": 0_i64},
                },
            )
            .upsert(true)
            .await
            .map_err(write_err(SETTINGS))?;
        Ok(())
    }
}

impl QuizStore for MongoQuizStore {
    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_quiz(quiz).await.map_err(Into::into) })
    }

    fn find_quiz(&self, id: QuizId) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_quiz(id).await.map_err(Into::into) })
    }

    fn delete_quiz(&self, id: QuizId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_quiz(id).await.map_err(Into::into) })
    }

    fn join_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<JoinOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.join_participant(participant).await.map_err(Into::into) })
    }

    fn find_participant(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_participant(&quiz_id, &participant_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_participants(
        &self,
        quiz_id: QuizId,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_participants(quiz_id).await.map_err(Into::into) })
    }

    fn create_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create_answer(answer).await.map_err(Into::into) })
    }

    fn find_answer(&self, key: AnswerKey) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_answer(key).await.map_err(Into::into) })
    }

    fn list_answers(
        &self,
        quiz_id: QuizId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_answers(quiz_id, question_id)
                .await
                .map_err(Into::into)
        })
    }

    fn set_answer_score(
        &self,
        key: AnswerKey,
        score: i64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_answer(key, doc! {"score": score})
                .await
                .map_err(Into::into)
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
            store
                .update_answer(
                    key,
                    doc! {"is_cheating": is_cheating, "cheating_reason": reason},
                )
                .await
                .map(|_| ())
                .map_err(Into::into)
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
        Box::pin(async move { store.list_leaderboard(month).await.map_err(Into::into) })
    }

    fn clear_leaderboard(&self, month: String) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.clear_leaderboard(month).await.map_err(Into::into) })
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
        Box::pin(async move { store.find_profile(user_id).await.map_err(Into::into) })
    }

    fn save_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_profile(profile).await.map_err(Into::into) })
    }

    fn find_host_role(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<HostRole>>> {
        let store = self.clone();
        Box::pin(async move { store.find_host_role(user_id).await.map_err(Into::into) })
    }

    fn save_host_role(
        &self,
        user_id: String,
        role: HostRole,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_host_role(user_id, role)
                .await
                .map_err(Into::into)
        })
    }

    fn find_settings(&self) -> BoxFuture<'static, StorageResult<SettingsEntity>> {
        let store = self.clone();
        Box::pin(async move { store.find_settings().await.map_err(Into::into) })
    }

    fn save_settings(&self, settings: SettingsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_settings(settings).await.map_err(Into::into) })
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
