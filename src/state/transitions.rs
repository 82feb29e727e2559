use std::future::Future;

use crate::{
    error::ServiceError,
    services::sse_events::broadcast_phase_changed,
    state::{SharedState, TransitionGate, state_machine::QuizEvent},
};

/// Execute a planned state-machine transition, then broadcast the resulting phase change.
///
/// `Ok(None)` means the transition was skipped and nothing was broadcast.
pub async fn run_transition_with_broadcast<F, Fut, T>(
    state: &SharedState,
    event: QuizEvent,
    work: F,
) -> Result<Option<T>, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let Some((res, next)) = state.run_transition(event, work).await? else {
        return Ok(None);
    };
    broadcast_phase_changed(state, next).await;
    Ok(Some(res))
}

/// Same as [`run_transition_with_broadcast`] for callers that already hold the gate.
pub async fn run_gated_transition_with_broadcast<F, Fut, T>(
    state: &SharedState,
    gate: &TransitionGate<'_>,
    event: QuizEvent,
    work: F,
) -> Result<Option<T>, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let Some((res, next)) = state.run_gated_transition(gate, event, work).await? else {
        return Ok(None);
    };
    broadcast_phase_changed(state, next).await;
    Ok(Some(res))
}
