use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use quiz_live_back::{
    config::{AppConfig, HostSeed},
    dao::{
        models::HostRole,
        quiz_store::{AnswerKey, QuizStore, memory::MemoryQuizStore},
    },
    dto::{
        participant::SubmitAnswerRequest,
        phase::VisiblePhase,
        quiz::{QuestionInput, QuestionType},
    },
    oracle::{CheatInput, CheatOracle, CheatVerdict, OracleError},
    services::{
        access::{self, HostIdentity},
        answer_watch, authoring_service, jolly, leaderboard_service, participant_service,
        session_service, sse_events,
    },
    state::{AppState, SharedState, draft::DEFAULT_DRAFT_NAME, state_machine::QuizPhase},
};
use tokio::time::{sleep, timeout};

#[derive(Default)]
struct CountingOracle {
    calls: AtomicUsize,
}

impl CheatOracle for CountingOracle {
    fn classify(&self, input: CheatInput) -> BoxFuture<'static, Result<CheatVerdict, OracleError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Ok(CheatVerdict {
                is_cheating: input.response_time < 0.01,
                reason: "checked".into(),
            })
        })
    }
}

struct Harness {
    state: SharedState,
    store: MemoryQuizStore,
    host: HostIdentity,
    oracle: Arc<CountingOracle>,
}

async fn harness() -> Harness {
    let config = AppConfig::ephemeral().with_hosts(vec![HostSeed {
        user_id: "host-1".into(),
        role: HostRole::Host,
    }]);
    let oracle = Arc::new(CountingOracle::default());
    let state = AppState::new(config, oracle.clone());
    let store = MemoryQuizStore::new();
    access::seed_hosts(&store, state.config().hosts())
        .await
        .unwrap();
    state.set_quiz_store(Arc::new(store.clone())).await;
    let host = access::authorize_host(&state, "host-1", true).await.unwrap();

    Harness {
        state,
        store,
        host,
        oracle,
    }
}

fn choice(text: &str, options: &[&str], correct: &str) -> QuestionInput {
    QuestionInput {
        text: text.into(),
        question_type: QuestionType::MultipleChoice,
        answer_type: None,
        options: options.iter().map(|option| option.to_string()).collect(),
        correct_answer: correct.into(),
        correct_order: None,
        media_url: None,
    }
}

/// Author the two-question quiz and publish it; returns the session and question ids.
async fn publish_capitals(h: &Harness) -> (String, String, String) {
    let q1 = authoring_service::add_question(
        &h.state,
        choice("What is the capital of France?", &["Paris", "Rome"], "Paris"),
    )
    .await
    .unwrap();
    let q2 = authoring_service::add_question(
        &h.state,
        choice("The answer to everything is?", &["41", "42"], "42"),
    )
    .await
    .unwrap();

    let published = session_service::publish(&h.state, &h.host).await.unwrap();
    assert!(published.applied);
    assert_eq!(published.phase, VisiblePhase::Lobby);
    (published.quiz_id.unwrap(), q1.id, q2.id)
}

async fn answer(h: &Harness, quiz_id: &str, participant: &str, question_id: &str, text: &str) -> bool {
    participant_service::submit_answer(
        &h.state,
        quiz_id,
        participant,
        SubmitAnswerRequest {
            question_id: question_id.into(),
            answer_text: Some(text.into()),
            answer_order: None,
        },
    )
    .await
    .unwrap()
    .accepted
}

async fn score_of(h: &Harness, quiz_id: &str, participant: &str) -> i64 {
    h.store
        .find_participant(quiz_id.into(), participant.into())
        .await
        .unwrap()
        .unwrap()
        .score
}

#[tokio::test]
async fn full_session_settles_each_question_and_merges_the_leaderboard() {
    let h = harness().await;
    let (quiz_id, q1, q2) = publish_capitals(&h).await;

    // Nobody joined yet: beginning is a no-op.
    assert!(!session_service::begin(&h.state).await.unwrap().applied);

    participant_service::join(&h.state, &quiz_id, "p1", Some("p1@example.com"))
        .await
        .unwrap();
    participant_service::join(&h.state, &quiz_id, "p2", Some("p2@example.com"))
        .await
        .unwrap();
    assert!(session_service::begin(&h.state).await.unwrap().applied);

    assert!(answer(&h, &quiz_id, "p1", &q1, "Paris").await);
    assert!(answer(&h, &quiz_id, "p2", &q1, "Rome").await);
    assert!(session_service::reveal(&h.state).await.unwrap().applied);
    let advanced = session_service::advance(&h.state).await.unwrap();
    assert!(advanced.applied);
    assert_eq!(advanced.phase, VisiblePhase::Live);
    assert_eq!(score_of(&h, &quiz_id, "p1").await, 10);
    assert_eq!(score_of(&h, &quiz_id, "p2").await, 0);

    assert!(answer(&h, &quiz_id, "p1", &q2, "42").await);
    assert!(answer(&h, &quiz_id, "p2", &q2, "42").await);
    let ended = session_service::advance(&h.state).await.unwrap();
    assert!(ended.applied);
    assert_eq!(ended.phase, VisiblePhase::Ended);
    assert_eq!(score_of(&h, &quiz_id, "p1").await, 20);
    assert_eq!(score_of(&h, &quiz_id, "p2").await, 10);

    let board = leaderboard_service::monthly_leaderboard(&h.state)
        .await
        .unwrap();
    let rows: Vec<_> = board
        .entries
        .iter()
        .map(|entry| (entry.name.as_str(), entry.monthly_score))
        .collect();
    assert_eq!(rows, vec![("p1", 20), ("p2", 10)]);

    // A second advance after the end changes nothing.
    assert!(!session_service::advance(&h.state).await.unwrap().applied);
    let settings = h.store.find_settings().await.unwrap();
    assert_eq!(settings.total_quizzes_held, 1);
}

#[tokio::test]
async fn rejoining_keeps_a_single_participant_record() {
    let h = harness().await;
    let (quiz_id, _, _) = publish_capitals(&h).await;

    let first = participant_service::join(&h.state, &quiz_id, "p1", None)
        .await
        .unwrap();
    let again = participant_service::join(&h.state, &quiz_id, "p1", None)
        .await
        .unwrap();

    assert!(first.created);
    assert!(!again.created);
    assert_eq!(again.participant.score, 0);
    assert_eq!(
        h.store.list_participants(quiz_id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn late_answers_are_recorded_without_changing_totals() {
    let h = harness().await;
    let (quiz_id, q1, q2) = publish_capitals(&h).await;
    participant_service::join(&h.state, &quiz_id, "p1", None)
        .await
        .unwrap();
    participant_service::join(&h.state, &quiz_id, "p2", None)
        .await
        .unwrap();
    session_service::begin(&h.state).await.unwrap();

    assert!(answer(&h, &quiz_id, "p2", &q1, "Paris").await);
    session_service::advance(&h.state).await.unwrap();

    // Q1 is settled; p1 answers it anyway.
    assert!(answer(&h, &quiz_id, "p1", &q1, "Paris").await);
    assert!(
        h.store
            .find_answer(AnswerKey::new(quiz_id.clone(), q1.clone(), "p1"))
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(score_of(&h, &quiz_id, "p1").await, 0);

    assert!(answer(&h, &quiz_id, "p1", &q2, "42").await);
    session_service::advance(&h.state).await.unwrap();
    assert_eq!(score_of(&h, &quiz_id, "p1").await, 10);
    assert_eq!(score_of(&h, &quiz_id, "p2").await, 10);
}

#[tokio::test]
async fn duplicate_submissions_store_one_answer_and_consult_the_oracle_once() {
    let h = harness().await;
    let mut host_events = h.state.host_sse().subscribe();
    let watcher = tokio::spawn(answer_watch::run(h.state.clone()));
    sleep(Duration::from_millis(50)).await;

    let (quiz_id, q1, _) = publish_capitals(&h).await;
    participant_service::join(&h.state, &quiz_id, "p1", None)
        .await
        .unwrap();
    session_service::begin(&h.state).await.unwrap();

    assert!(answer(&h, &quiz_id, "p1", &q1, "Rome").await);
    assert!(!answer(&h, &quiz_id, "p1", &q1, "Paris").await);

    let annotated = timeout(Duration::from_secs(2), async {
        loop {
            let event = host_events.recv().await.unwrap();
            if event.event.as_deref() == Some(sse_events::EVENT_ANSWER_ANNOTATED) {
                break event;
            }
        }
    })
    .await
    .unwrap();
    let payload: serde_json::Value = serde_json::from_str(&annotated.data).unwrap();
    assert_eq!(payload["participant_id"], "p1");
    sleep(Duration::from_millis(50)).await;

    assert_eq!(h.oracle.calls.load(Ordering::SeqCst), 1);
    let stored = h
        .store
        .find_answer(AnswerKey::new(quiz_id.clone(), q1.clone(), "p1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.answer_text, "Rome");
    assert_eq!(stored.score, 0);
    assert_eq!(stored.cheating_reason.as_deref(), Some("checked"));
    assert_eq!(
        h.store
            .list_answers(quiz_id, q1)
            .await
            .unwrap()
            .len(),
        1
    );
    watcher.abort();
}

#[tokio::test]
async fn jolly_is_a_one_time_lobby_bonus_for_absentees() {
    let h = harness().await;

    // First session of the month, attended by p1 only.
    let (quiz_id, q1, q2) = publish_capitals(&h).await;
    participant_service::join(&h.state, &quiz_id, "p1", Some("p1@example.com"))
        .await
        .unwrap();
    session_service::begin(&h.state).await.unwrap();
    answer(&h, &quiz_id, "p1", &q1, "Paris").await;
    session_service::advance(&h.state).await.unwrap();
    answer(&h, &quiz_id, "p1", &q2, "42").await;
    session_service::advance(&h.state).await.unwrap();
    assert!(session_service::reset(&h.state).await.unwrap().applied);

    // Second session: p2 missed the first one.
    let (quiz_id, q1, q2) = publish_capitals(&h).await;
    participant_service::join(&h.state, &quiz_id, "p1", Some("p1@example.com"))
        .await
        .unwrap();
    participant_service::join(&h.state, &quiz_id, "p2", Some("p2@example.com"))
        .await
        .unwrap();

    assert!(!jolly::activate(&h.state, &quiz_id, "p1").await.unwrap().applied);
    let activated = jolly::activate(&h.state, &quiz_id, "p2").await.unwrap();
    assert!(activated.applied && activated.jolly_active);
    assert!(!jolly::activate(&h.state, &quiz_id, "p2").await.unwrap().applied);

    session_service::begin(&h.state).await.unwrap();
    assert!(!jolly::activate(&h.state, &quiz_id, "p1").await.unwrap().applied);

    answer(&h, &quiz_id, "p2", &q1, "Paris").await;
    session_service::advance(&h.state).await.unwrap();
    answer(&h, &quiz_id, "p2", &q2, "41").await;
    session_service::advance(&h.state).await.unwrap();

    // Totals stay raw; the bonus doubles the leaderboard contribution only.
    assert_eq!(score_of(&h, &quiz_id, "p2").await, 10);
    let board = leaderboard_service::monthly_leaderboard(&h.state)
        .await
        .unwrap();
    let rows: Vec<_> = board
        .entries
        .iter()
        .map(|entry| (entry.name.as_str(), entry.monthly_score))
        .collect();
    assert_eq!(rows, vec![("p1", 20), ("p2", 20)]);
    let profile = h.store.find_profile("p2".into()).await.unwrap().unwrap();
    assert!(!profile.jolly_available);
}

#[tokio::test]
async fn restart_replays_without_touching_the_leaderboard() {
    let h = harness().await;
    let (quiz_id, q1, q2) = publish_capitals(&h).await;
    participant_service::join(&h.state, &quiz_id, "p1", Some("p1@example.com"))
        .await
        .unwrap();
    session_service::begin(&h.state).await.unwrap();
    answer(&h, &quiz_id, "p1", &q1, "Paris").await;
    session_service::advance(&h.state).await.unwrap();
    answer(&h, &quiz_id, "p1", &q2, "42").await;
    session_service::advance(&h.state).await.unwrap();

    let restarted = session_service::restart(&h.state).await.unwrap();
    assert!(restarted.applied);
    assert_eq!(restarted.phase, VisiblePhase::Live);
    assert_eq!(score_of(&h, &quiz_id, "p1").await, 0);

    assert!(answer(&h, &quiz_id, "p1", &q1, "Paris").await);
    session_service::advance(&h.state).await.unwrap();
    session_service::advance(&h.state).await.unwrap();
    assert_eq!(score_of(&h, &quiz_id, "p1").await, 10);

    let board = leaderboard_service::monthly_leaderboard(&h.state)
        .await
        .unwrap();
    assert_eq!(board.entries.len(), 1);
    assert_eq!(board.entries[0].monthly_score, 20);
}

#[tokio::test]
async fn reset_while_authoring_starts_a_fresh_draft() {
    let h = harness().await;
    authoring_service::rename_draft(&h.state, "Friday quiz").await;
    authoring_service::add_question(
        &h.state,
        choice("What is the capital of France?", &["Paris", "Rome"], "Paris"),
    )
    .await
    .unwrap();

    let reset = session_service::reset(&h.state).await.unwrap();
    assert!(reset.applied);
    assert_eq!(reset.phase, VisiblePhase::Authoring);
    assert_eq!(reset.quiz_id, None);

    let draft = authoring_service::get_draft(&h.state).await;
    assert_eq!(draft.name, DEFAULT_DRAFT_NAME);
    assert!(draft.questions.is_empty());
}

#[tokio::test]
async fn host_override_during_reveal_is_what_settlement_adds() {
    let h = harness().await;
    let (quiz_id, q1, _) = publish_capitals(&h).await;
    participant_service::join(&h.state, &quiz_id, "p1", None)
        .await
        .unwrap();
    session_service::begin(&h.state).await.unwrap();
    assert!(answer(&h, &quiz_id, "p1", &q1, "Rome").await);
    session_service::reveal(&h.state).await.unwrap();

    let overridden = session_service::override_score(
        &h.state,
        q1.clone(),
        "p1".into(),
        &serde_json::json!(7),
    )
    .await
    .unwrap();
    assert!(overridden.applied);
    assert_eq!(overridden.score, 7);

    session_service::advance(&h.state).await.unwrap();
    assert_eq!(score_of(&h, &quiz_id, "p1").await, 7);

    // The question is settled: later overrides are ignored.
    let late = session_service::override_score(&h.state, q1.clone(), "p1".into(), &serde_json::json!(50))
        .await
        .unwrap();
    assert!(!late.applied);
    assert_eq!(late.score, 7);
    assert_eq!(score_of(&h, &quiz_id, "p1").await, 7);
}

#[tokio::test]
async fn final_advance_survives_a_store_outage_without_double_counting() {
    let h = harness().await;
    let (quiz_id, q1, q2) = publish_capitals(&h).await;
    participant_service::join(&h.state, &quiz_id, "p1", Some("p1@example.com"))
        .await
        .unwrap();
    session_service::begin(&h.state).await.unwrap();
    answer(&h, &quiz_id, "p1", &q1, "Paris").await;
    session_service::advance(&h.state).await.unwrap();
    answer(&h, &quiz_id, "p1", &q2, "42").await;

    h.store.set_offline(true);
    assert!(session_service::advance(&h.state).await.is_err());
    assert_eq!(h.state.phase().await, QuizPhase::Live);

    h.store.set_offline(false);
    let ended = session_service::advance(&h.state).await.unwrap();
    assert!(ended.applied);
    assert_eq!(ended.phase, VisiblePhase::Ended);
    assert!(!session_service::advance(&h.state).await.unwrap().applied);

    assert_eq!(score_of(&h, &quiz_id, "p1").await, 20);
    let board = leaderboard_service::monthly_leaderboard(&h.state)
        .await
        .unwrap();
    let scores: Vec<_> = board.entries.iter().map(|entry| entry.monthly_score).collect();
    assert_eq!(scores, vec![20]);
    assert_eq!(h.store.find_settings().await.unwrap().total_quizzes_held, 1);
}

#[tokio::test]
async fn ended_session_turns_late_joiners_away() {
    let h = harness().await;
    let (quiz_id, _, _) = publish_capitals(&h).await;
    participant_service::join(&h.state, &quiz_id, "p1", None)
        .await
        .unwrap();
    session_service::begin(&h.state).await.unwrap();
    session_service::advance(&h.state).await.unwrap();
    session_service::advance(&h.state).await.unwrap();
    assert_eq!(h.state.phase().await, QuizPhase::Ended);

    let err = participant_service::join(&h.state, &quiz_id, "late", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no longer accepts participants"));
    assert!(
        h.store
            .find_participant(quiz_id.clone(), "late".into())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn answers_missed_by_the_feed_are_reviewed_once_on_catch_up() {
    let h = harness().await;
    let (quiz_id, q1, _) = publish_capitals(&h).await;
    for participant in ["p1", "p2"] {
        participant_service::join(&h.state, &quiz_id, participant, None)
            .await
            .unwrap();
    }
    session_service::begin(&h.state).await.unwrap();
    // Nobody listens to the feed yet, so these events are lost.
    assert!(answer(&h, &quiz_id, "p1", &q1, "Paris").await);
    assert!(answer(&h, &quiz_id, "p2", &q1, "Rome").await);

    let watcher = tokio::spawn(answer_watch::run(h.state.clone()));
    timeout(Duration::from_secs(2), async {
        while h.oracle.calls.load(Ordering::SeqCst) < 2 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    sleep(Duration::from_millis(50)).await;

    let store: Arc<dyn QuizStore> = Arc::new(h.store.clone());
    answer_watch::catch_up(&h.state, &store).await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(h.oracle.calls.load(Ordering::SeqCst), 2);

    for participant in ["p1", "p2"] {
        let stored = h
            .store
            .find_answer(AnswerKey::new(quiz_id.clone(), q1.clone(), participant))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_cheating.is_some());
    }
    watcher.abort();
}
