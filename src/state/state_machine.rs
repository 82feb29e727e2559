use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle phases of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    /// The host edits a local draft; nothing is shared yet.
    Authoring,
    /// The session is published and accepts participants.
    Lobby,
    /// The current question is open for answers.
    Live,
    /// The correct answer of the current question is disclosed.
    Revealing,
    /// Every question has been settled and the leaderboard merged.
    Ended,
}

impl QuizPhase {
    /// Whether a question cursor is meaningful in this phase.
    pub fn has_current_question(&self) -> bool {
        matches!(self, QuizPhase::Live | QuizPhase::Revealing)
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEvent {
    /// Host publishes the draft as a shared session.
    Publish,
    /// Host opens the first question.
    Begin,
    /// Host discloses the answer of the current question.
    Reveal,
    /// Host moves on to the next question after settlement.
    Advance,
    /// Host settles the last question and closes the session.
    Finish,
    /// Host replays an ended session from the first question.
    Restart,
    /// Host throws the shared session away and returns to a fresh draft.
    Discard,
    /// A previously published session is picked up again after a restart of the server.
    Resume(QuizPhase),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: QuizPhase,
    /// The event that cannot be applied from this phase.
    pub event: QuizEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    #[error("a phase transition is already pending")]
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    #[error(transparent)]
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// No transition is currently pending.
    #[error("no transition is pending")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("pending transition does not match")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    #[error("phase changed (expected {expected:?}, got {actual:?})")]
    PhaseMismatch {
        /// Phase when plan was created.
        expected: QuizPhase,
        /// Current phase.
        actual: QuizPhase,
    },
    /// State machine version changed since the plan was created.
    #[error("phase version changed (expected {expected}, got {actual})")]
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortError {
    /// No transition is currently pending.
    #[error("no transition is pending")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("transition plan does not match")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: QuizPhase,
    /// Phase the state machine will transition to.
    pub to: QuizPhase,
    /// Event that triggered this transition.
    pub event: QuizEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: QuizPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<QuizPhase>,
}

/// State machine driving a single quiz session from authoring to the final scoreboard.
#[derive(Debug, Clone)]
pub struct QuizStateMachine {
    phase: QuizPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for QuizStateMachine {
    fn default() -> Self {
        Self {
            phase: QuizPhase::Authoring,
            version: 0,
            pending: None,
        }
    }
}

impl QuizStateMachine {
    /// Create a new state machine initialised in the authoring state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: QuizEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event.clone())
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<QuizPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, leaving the phase untouched.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: QuizEvent) -> Result<QuizPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (QuizPhase::Authoring, QuizEvent::Publish) => QuizPhase::Lobby,
            (QuizPhase::Lobby, QuizEvent::Begin) => QuizPhase::Live,
            (QuizPhase::Live, QuizEvent::Reveal) => QuizPhase::Revealing,
            (QuizPhase::Live | QuizPhase::Revealing, QuizEvent::Advance) => QuizPhase::Live,
            (QuizPhase::Live | QuizPhase::Revealing, QuizEvent::Finish) => QuizPhase::Ended,
            (QuizPhase::Ended, QuizEvent::Restart) => QuizPhase::Live,
            (
                QuizPhase::Lobby | QuizPhase::Live | QuizPhase::Revealing | QuizPhase::Ended,
                QuizEvent::Discard,
            ) => QuizPhase::Authoring,
            (QuizPhase::Authoring, QuizEvent::Resume(target)) if target != QuizPhase::Authoring => {
                target
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut QuizStateMachine, event: QuizEvent) -> QuizPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_authoring() {
        let sm = QuizStateMachine::new();
        assert_eq!(sm.phase(), QuizPhase::Authoring);
    }

    #[test]
    fn full_happy_path_through_session() {
        let mut sm = QuizStateMachine::new();

        assert_eq!(apply(&mut sm, QuizEvent::Publish), QuizPhase::Lobby);
        assert_eq!(apply(&mut sm, QuizEvent::Begin), QuizPhase::Live);
        assert_eq!(apply(&mut sm, QuizEvent::Reveal), QuizPhase::Revealing);
        assert_eq!(apply(&mut sm, QuizEvent::Advance), QuizPhase::Live);
        assert_eq!(apply(&mut sm, QuizEvent::Advance), QuizPhase::Live);
        assert_eq!(apply(&mut sm, QuizEvent::Finish), QuizPhase::Ended);
        assert_eq!(apply(&mut sm, QuizEvent::Restart), QuizPhase::Live);
        assert_eq!(apply(&mut sm, QuizEvent::Discard), QuizPhase::Authoring);
        assert_eq!(sm.snapshot().version, 8);
    }

    #[test]
    fn reveal_is_only_allowed_from_live() {
        let mut sm = QuizStateMachine::new();
        apply(&mut sm, QuizEvent::Publish);

        let err = sm.plan(QuizEvent::Reveal).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, QuizPhase::Lobby);
                assert_eq!(invalid.event, QuizEvent::Reveal);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        apply(&mut sm, QuizEvent::Begin);
        apply(&mut sm, QuizEvent::Reveal);
        assert!(sm.plan(QuizEvent::Reveal).is_err());
    }

    #[test]
    fn discard_is_rejected_while_authoring() {
        let mut sm = QuizStateMachine::new();
        assert!(matches!(
            sm.plan(QuizEvent::Discard),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn restart_requires_ended_session() {
        let mut sm = QuizStateMachine::new();
        apply(&mut sm, QuizEvent::Publish);
        apply(&mut sm, QuizEvent::Begin);
        assert!(sm.plan(QuizEvent::Restart).is_err());
    }

    #[test]
    fn resume_jumps_to_persisted_phase_once() {
        let mut sm = QuizStateMachine::new();
        assert_eq!(
            apply(&mut sm, QuizEvent::Resume(QuizPhase::Revealing)),
            QuizPhase::Revealing
        );
        assert!(sm.plan(QuizEvent::Resume(QuizPhase::Lobby)).is_err());

        let mut fresh = QuizStateMachine::new();
        assert!(fresh.plan(QuizEvent::Resume(QuizPhase::Authoring)).is_err());
    }

    #[test]
    fn pending_plan_blocks_second_plan() {
        let mut sm = QuizStateMachine::new();
        apply(&mut sm, QuizEvent::Publish);
        apply(&mut sm, QuizEvent::Begin);

        let plan = sm.plan(QuizEvent::Advance).unwrap();
        assert_eq!(sm.plan(QuizEvent::Advance).unwrap_err(), PlanError::AlreadyPending);
        assert_eq!(sm.snapshot().pending, Some(QuizPhase::Live));

        sm.apply(plan.id).unwrap();
        assert!(sm.snapshot().pending.is_none());
    }

    #[test]
    fn abort_leaves_phase_unchanged() {
        let mut sm = QuizStateMachine::new();
        apply(&mut sm, QuizEvent::Publish);
        apply(&mut sm, QuizEvent::Begin);

        let plan = sm.plan(QuizEvent::Finish).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), QuizPhase::Live);
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan_pending() {
        let mut sm = QuizStateMachine::new();
        let plan = sm.plan(QuizEvent::Publish).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(sm.apply(plan.id).unwrap(), QuizPhase::Lobby);
    }
}
