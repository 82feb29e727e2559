pub mod draft;
/// Once-per-answer claims for the oracle.
pub mod ingestion;
pub mod quiz;
mod sse;
/// Phase machine with plan/apply/abort.
pub mod state_machine;
/// Transition runners that broadcast phase changes.
pub mod transitions;

use std::{future::Future, sync::Arc};

use tokio::sync::{Mutex, MutexGuard, RwLock, watch};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    dao::quiz_store::QuizStore,
    error::ServiceError,
    oracle::CheatOracle,
    state::{
        draft::{Draft, HostScratch, ScratchContents},
        ingestion::IngestionGuard,
        quiz::{QuizId, QuizSession},
        state_machine::QuizPhase,
    },
};

pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::{
    sse::SseState,
    state_machine::{QuizEvent, QuizStateMachine},
};

/// Application state shared across handlers and background tasks.
pub type SharedState = Arc<AppState>;

/// Proof that the caller holds the single transition slot.
pub type TransitionGate<'a> = MutexGuard<'a, ()>;

/// Central application state: the host's draft, the active session and its phase machine,
/// the store handle and the SSE hubs.
pub struct AppState {
    config: AppConfig,
    quiz_store: RwLock<Option<Arc<dyn QuizStore>>>,
    oracle: Arc<dyn CheatOracle>,
    sse: SseState,
    machine: RwLock<QuizStateMachine>,
    current_quiz: RwLock<Option<QuizSession>>,
    draft: RwLock<Draft>,
    pending_resume: Mutex<Option<QuizId>>,
    scratch: Option<HostScratch>,
    ingestion: IngestionGuard,
    answer_window: RwLock<()>,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The draft and the id of the session to resume are read back from the scratch file.
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, oracle: Arc<dyn CheatOracle>) -> SharedState {
        let scratch = config.scratch_path().cloned().map(HostScratch::new);
        let restored = scratch
            .as_ref()
            .map(HostScratch::load)
            .unwrap_or_default();
        let (degraded_tx, _rx) = watch::channel(true);

        Arc::new(Self {
            config,
            quiz_store: RwLock::new(None),
            oracle,
            sse: SseState::new(64, 64),
            machine: RwLock::new(QuizStateMachine::new()),
            current_quiz: RwLock::new(None),
            draft: RwLock::new(restored.draft),
            pending_resume: Mutex::new(restored.active_quiz_id),
            scratch,
            ingestion: IngestionGuard::default(),
            answer_window: RwLock::new(()),
            degraded: degraded_tx,
            transition_gate: Mutex::new(()),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Cheat oracle consulted for every new answer.
    pub fn oracle(&self) -> Arc<dyn CheatOracle> {
        self.oracle.clone()
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn quiz_store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.quiz_store.read().await;
        guard.as_ref().cloned()
    }

    /// Store handle, or [`ServiceError::Degraded`] when storage is unreachable.
    pub async fn require_quiz_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.quiz_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn set_quiz_store(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.quiz_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag; returns whether it changed.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the host SSE stream.
    pub fn host_sse(&self) -> &SseHub {
        self.sse.host()
    }

    /// Answer bookkeeping of the active session.
    pub fn ingestion(&self) -> &IngestionGuard {
        &self.ingestion
    }

    /// Submissions hold this for reading while they check the phase and write;
    /// settlement holds it for writing while it reads the answers.
    pub fn answer_window(&self) -> &RwLock<()> {
        &self.answer_window
    }

    /// Current phase of the session state machine.
    pub async fn phase(&self) -> QuizPhase {
        self.machine.read().await.phase()
    }

    /// Phase, version and pending target of the state machine.
    pub async fn snapshot(&self) -> Snapshot {
        let sm = self.machine.read().await;
        sm.snapshot()
    }

    /// Clone of the active session, if any.
    pub async fn current_quiz(&self) -> Option<QuizSession> {
        self.current_quiz.read().await.clone()
    }

    /// Run `f` against the active session.
    pub async fn read_current_quiz<R>(&self, f: impl FnOnce(Option<&QuizSession>) -> R) -> R {
        let guard = self.current_quiz.read().await;
        f(guard.as_ref())
    }

    /// Mutate the active session in place; returns `None` when there is none.
    pub async fn with_current_quiz_mut<R>(
        &self,
        f: impl FnOnce(&mut QuizSession) -> R,
    ) -> Option<R> {
        let mut guard = self.current_quiz.write().await;
        guard.as_mut().map(f)
    }

    /// Replace the active session, rebuild answer tracking and remember the choice on disk.
    pub async fn set_current_quiz(&self, session: Option<QuizSession>) {
        self.ingestion.rebuild(session.as_ref()).await;
        {
            let mut guard = self.current_quiz.write().await;
            *guard = session;
        }
        self.persist_scratch().await;
    }

    /// Clone of the host draft.
    pub async fn draft(&self) -> Draft {
        self.draft.read().await.clone()
    }

    /// Mutate the draft and save it to the scratch file.
    pub async fn with_draft_mut<R>(&self, f: impl FnOnce(&mut Draft) -> R) -> R {
        let result = {
            let mut guard = self.draft.write().await;
            f(&mut guard)
        };
        self.persist_scratch().await;
        result
    }

    /// Session id restored from the scratch file, handed out once.
    pub async fn take_pending_resume(&self) -> Option<QuizId> {
        self.pending_resume.lock().await.take()
    }

    async fn persist_scratch(&self) {
        let Some(scratch) = &self.scratch else {
            return;
        };

        let contents = ScratchContents {
            draft: self.draft.read().await.clone(),
            active_quiz_id: self
                .current_quiz
                .read()
                .await
                .as_ref()
                .map(|quiz| quiz.id.clone()),
        };
        if let Err(err) = scratch.save(&contents).await {
            warn!(error = %err, "failed to persist host scratch");
        }
    }

    /// Claim the transition slot, or `None` while another transition is running.
    pub fn try_enter_transition(&self) -> Option<TransitionGate<'_>> {
        self.transition_gate.try_lock().ok()
    }

    async fn plan_transition(&self, event: QuizEvent) -> Result<Plan, PlanError> {
        let mut sm = self.machine.write().await;
        sm.plan(event)
    }

    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<QuizPhase, ApplyError> {
        let mut sm = self.machine.write().await;
        sm.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.machine.write().await;
        sm.abort(plan_id)
    }

    /// Plan `event`, run `work`, then apply the plan on success or abort it on failure.
    ///
    /// Returns `Ok(None)` when the event is not legal from the current phase: such attempts are
    /// no-ops. Errors and timeouts of `work` leave the phase unchanged.
    pub async fn run_gated_transition<F, Fut, T>(
        &self,
        _gate: &TransitionGate<'_>,
        event: QuizEvent,
        work: F,
    ) -> Result<Option<(T, QuizPhase)>, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let plan_id = match self.plan_transition(event.clone()).await {
            Ok(Plan { id, .. }) => id,
            Err(err) => {
                debug!(event = ?event, error = ?err, "transition skipped");
                return Ok(None);
            }
        };

        let outcome = match timeout(self.config.transition_timeout(), work()).await {
            Ok(result) => result,
            Err(_) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after timeout"
                    );
                }
                return Err(ServiceError::Timeout);
            }
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                Ok(Some((value, next)))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                Err(err)
            }
        }
    }

    /// [`run_gated_transition`](Self::run_gated_transition) after claiming the gate; a busy gate
    /// makes the call a no-op.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: QuizEvent,
        work: F,
    ) -> Result<Option<(T, QuizPhase)>, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let Some(gate) = self.try_enter_transition() else {
            debug!(event = ?event, "transition skipped; another one is in flight");
            return Ok(None);
        };
        self.run_gated_transition(&gate, event, work).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::UnconfiguredOracle;

    fn state() -> SharedState {
        AppState::new(AppConfig::ephemeral(), Arc::new(UnconfiguredOracle))
    }

    #[tokio::test]
    async fn failed_work_leaves_phase_unchanged() {
        let state = state();
        let result: Result<Option<((), QuizPhase)>, _> = state
            .run_transition(QuizEvent::Publish, || async {
                Err(ServiceError::Degraded)
            })
            .await;
        assert!(result.is_err());
        assert_eq!(state.phase().await, QuizPhase::Authoring);
        assert!(state.snapshot().await.pending.is_none());
    }

    #[tokio::test]
    async fn illegal_event_is_a_no_op() {
        let state = state();
        let outcome = state
            .run_transition(QuizEvent::Reveal, || async { Ok(()) })
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(state.phase().await, QuizPhase::Authoring);
    }

    #[tokio::test]
    async fn busy_gate_skips_the_second_caller() {
        let state = state();
        let gate = state.try_enter_transition().unwrap();
        let outcome = state
            .run_transition(QuizEvent::Publish, || async { Ok(()) })
            .await
            .unwrap();
        assert!(outcome.is_none());

        let applied = state
            .run_gated_transition(&gate, QuizEvent::Publish, || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(applied.map(|(_, phase)| phase), Some(QuizPhase::Lobby));
    }

    #[tokio::test]
    async fn degraded_until_a_store_is_installed() {
        let state = state();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_quiz_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_quiz_store(Arc::new(crate::dao::quiz_store::memory::MemoryQuizStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(state.require_quiz_store().await.is_ok());
        assert!(!state.update_degraded(false));
    }
}
