//! Follows the store's change feed and routes every new answer of the active session through
//! the cheat oracle exactly once.
//!
//! The feed is lossy: after subscribing, and whenever the receiver lags, the answers of the
//! tracked session are rescanned so nothing written in the gap goes unreviewed.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    watch,
};
use tracing::{debug, info, warn};

use crate::{
    dao::{models::StoreEvent, quiz_store::AnswerKey, quiz_store::QuizStore},
    oracle::{self, CheatInput},
    services::sse_events,
    state::SharedState,
};

/// Run until the application shuts down, re-subscribing whenever storage comes back.
pub async fn run(state: SharedState) {
    let mut degraded = state.degraded_watcher();

    loop {
        let Some(store) = wait_for_store(&state, &mut degraded).await else {
            return;
        };
        info!("answer watcher subscribed to the store feed");

        let events = store_events(store.subscribe());
        tokio::pin!(events);
        catch_up(&state, &store).await;

        loop {
            tokio::select! {
                changed = degraded.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *degraded.borrow_and_update() {
                        info!("storage degraded; answer watcher paused");
                        break;
                    }
                }
                next = events.next() => match next {
                    Some(FeedItem::Event(event)) => ingest(&state, &store, event).await,
                    Some(FeedItem::Lagged) => catch_up(&state, &store).await,
                    None => {
                        debug!("store feed closed");
                        break;
                    }
                },
            }
        }
    }
}

async fn wait_for_store(
    state: &SharedState,
    degraded: &mut watch::Receiver<bool>,
) -> Option<Arc<dyn QuizStore>> {
    loop {
        let is_degraded = *degraded.borrow_and_update();
        if !is_degraded {
            if let Some(store) = state.quiz_store().await {
                return Some(store);
            }
        }
        degraded.changed().await.ok()?;
    }
}

enum FeedItem {
    Event(StoreEvent),
    Lagged,
}

fn store_events(mut receiver: broadcast::Receiver<StoreEvent>) -> impl Stream<Item = FeedItem> {
    async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => yield FeedItem::Event(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "answer watcher lagged behind the store feed");
                    yield FeedItem::Lagged;
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// Review every stored answer of the tracked session that has no verdict and no claim yet.
pub async fn catch_up(state: &SharedState, store: &Arc<dyn QuizStore>) {
    let Some((quiz_id, question_ids)) = state.ingestion().tracked_session().await else {
        return;
    };

    let mut rescanned = 0usize;
    for question_id in question_ids {
        let answers = match store.list_answers(quiz_id.clone(), question_id.clone()).await {
            Ok(answers) => answers,
            Err(err) => {
                warn!(%quiz_id, %question_id, error = %err, "answer rescan failed");
                continue;
            }
        };
        for answer in answers.into_iter().filter(|answer| answer.is_cheating.is_none()) {
            rescanned += 1;
            let event = StoreEvent::AnswerWritten {
                quiz_id: answer.quiz_id,
                question_id: answer.question_id,
                participant_id: answer.participant_id,
            };
            ingest(state, store, event).await;
        }
    }
    debug!(%quiz_id, rescanned, "answer rescan finished");
}

async fn ingest(state: &SharedState, store: &Arc<dyn QuizStore>, event: StoreEvent) {
    match event {
        StoreEvent::AnswerWritten {
            quiz_id,
            question_id,
            participant_id,
        } => {
            let Some(question_text) = state
                .ingestion()
                .question_text(&quiz_id, &question_id)
                .await
            else {
                debug!(%quiz_id, %question_id, "answer outside the active session ignored");
                return;
            };
            // Annotations and overrides rewrite the same document; only the first write counts.
            if !state.ingestion().claim(&question_id, &participant_id) {
                return;
            }

            let key = AnswerKey::new(quiz_id, question_id, participant_id);
            sse_events::broadcast_answer_received(state, &key);
            tokio::spawn(review(state.clone(), store.clone(), key, question_text));
        }
        StoreEvent::QuizDeleted { quiz_id } => {
            debug!(%quiz_id, "quiz removed from the store");
        }
    }
}

async fn review(
    state: SharedState,
    store: Arc<dyn QuizStore>,
    key: AnswerKey,
    question_text: String,
) {
    let answer = match store.find_answer(key.clone()).await {
        Ok(Some(answer)) => answer,
        Ok(None) => {
            debug!(?key, "answer vanished before review");
            return;
        }
        Err(err) => {
            warn!(?key, error = %err, "failed to load answer for review");
            return;
        }
    };

    let verdict = oracle::detect_cheating(
        state.oracle().as_ref(),
        CheatInput {
            response_time: answer.response_time,
            answer_text: answer.answer_text,
            question_text,
        },
        state.config().oracle_timeout(),
    )
    .await;

    if let Err(err) = store
        .annotate_answer(key.clone(), verdict.is_cheating, verdict.reason.clone())
        .await
    {
        warn!(?key, error = %err, "failed to store oracle verdict");
        return;
    }

    if verdict.is_cheating {
        warn!(
            quiz_id = %key.quiz_id,
            question_id = %key.question_id,
            participant_id = %key.participant_id,
            reason = %verdict.reason,
            "answer flagged by the cheat oracle"
        );
    }
    sse_events::broadcast_answer_annotated(&state, &key, &verdict);
}
