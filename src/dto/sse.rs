//! Payloads of the server-sent events streams.

use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{participant::ParticipantView, phase::VisiblePhase};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; `None` sends an unnamed message.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Raw text event.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`public` or `host`).
    pub stream: String,
    /// Greeting text.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Phase at connection time.
    pub phase: VisiblePhase,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// Whether storage is unreachable.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the session phase changes.
pub struct PhaseChangedEvent {
    /// New phase.
    pub phase: VisiblePhase,
    /// Session the phase belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<String>,
    /// Current question while Live or Revealing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    /// Zero-based index of the current question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_index: Option<usize>,
    /// RFC 3339 time the current question opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_started_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted when a participant joined the lobby or a running session.
pub struct ParticipantJoinedEvent {
    /// Session joined.
    pub quiz_id: String,
    /// New participant record.
    pub participant: ParticipantView,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted once a question's scores were committed.
pub struct ScoresSettledEvent {
    /// Session id.
    pub quiz_id: String,
    /// Question settled.
    pub question_id: String,
    /// Committed totals, highest first.
    pub standings: Vec<ParticipantView>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted when the session document no longer exists.
pub struct SessionDeletedEvent {
    /// Deleted session.
    pub quiz_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted when a participant engaged the bonus token.
pub struct JollyActivatedEvent {
    /// Session id.
    pub quiz_id: String,
    /// Participant who engaged the bonus.
    pub participant_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted after the monthly leaderboard was cleared.
pub struct LeaderboardClearedEvent {
    /// Month bucket that was cleared.
    pub month: String,
    /// Number of entries removed.
    pub removed: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Host-only event emitted when a new answer is stored.
pub struct AnswerReceivedEvent {
    /// Session id.
    pub quiz_id: String,
    /// Question answered.
    pub question_id: String,
    /// Author of the answer.
    pub participant_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Host-only event carrying the oracle verdict for an answer.
pub struct AnswerAnnotatedEvent {
    /// Session id.
    pub quiz_id: String,
    /// Question answered.
    pub question_id: String,
    /// Author of the answer.
    pub participant_id: String,
    /// Oracle verdict.
    pub is_cheating: bool,
    /// Oracle explanation.
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Host-only event emitted after a manual score change.
pub struct AnswerScoredEvent {
    /// Session id.
    pub quiz_id: String,
    /// Question answered.
    pub question_id: String,
    /// Author of the answer.
    pub participant_id: String,
    /// New score.
    pub score: i64,
}
