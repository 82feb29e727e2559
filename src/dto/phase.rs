use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::QuizPhase;

/// Session phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// The host is still authoring; no session is shared.
    Authoring,
    /// Waiting room, participants may join.
    Lobby,
    /// A question is open for answers.
    Live,
    /// The correct answer of the current question is shown.
    Revealing,
    /// Final standings.
    Ended,
}

impl From<QuizPhase> for VisiblePhase {
    fn from(value: QuizPhase) -> Self {
        match value {
            QuizPhase::Authoring => VisiblePhase::Authoring,
            QuizPhase::Lobby => VisiblePhase::Lobby,
            QuizPhase::Live => VisiblePhase::Live,
            QuizPhase::Revealing => VisiblePhase::Revealing,
            QuizPhase::Ended => VisiblePhase::Ended,
        }
    }
}
