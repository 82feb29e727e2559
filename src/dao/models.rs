use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::state::{
    quiz::{ParticipantId, Question, QuestionId, QuizId},
    state_machine::QuizPhase,
};

/// Shared session document, written only by the host process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizEntity {
    /// Primary key, also the invite reference.
    pub id: QuizId,
    /// Display name of the quiz.
    pub name: String,
    /// Owning host; never changes after publish.
    pub host_id: String,
    /// Phase observed by participants.
    pub phase: QuizPhase,
    /// Ordered questions.
    pub questions: Vec<Question>,
    /// Cursor into `questions`.
    pub current_question_index: usize,
    /// When the current question was opened.
    pub question_started_at: Option<SystemTime>,
    /// Questions already committed into participant totals.
    #[serde(default)]
    pub settled_questions: Vec<QuestionId>,
    /// Whether this session already contributed to the monthly leaderboard.
    #[serde(default)]
    pub leaderboard_merged: bool,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the document was written.
    pub updated_at: SystemTime,
}

/// One per (session, user) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Session the participant joined.
    pub quiz_id: QuizId,
    /// Stable user identity.
    pub id: ParticipantId,
    /// Display name frozen at join time.
    pub name: String,
    /// Avatar frozen at join time.
    pub avatar: String,
    /// Committed cumulative score.
    pub score: i64,
    /// Whether the bonus multiplier is engaged for this session.
    pub jolly_active: bool,
    /// Whether the monthly bonus token is still unused.
    pub jolly_available: bool,
    /// When the participant first joined.
    pub joined_at: SystemTime,
}

/// One per (session, question, participant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerEntity {
    /// Owning session.
    pub quiz_id: QuizId,
    /// Question answered.
    pub question_id: QuestionId,
    /// Author of the answer.
    pub participant_id: ParticipantId,
    /// Raw text, or a rendering of the submitted order.
    pub answer_text: String,
    /// Submitted permutation, reorder questions only.
    pub answer_order: Option<Vec<String>>,
    /// Seconds between question display and submission.
    pub response_time: f64,
    /// Points for this question; the host may override it before settlement.
    pub score: i64,
    /// Cheat oracle verdict, absent until the oracle answered.
    pub is_cheating: Option<bool>,
    /// Cheat oracle explanation.
    pub cheating_reason: Option<String>,
    /// Server time of the submission.
    pub submitted_at: SystemTime,
}

/// Monthly ranking row, one per distinct participant name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntryEntity {
    /// Month bucket formatted as `YYYY-MM`.
    pub month: String,
    /// Participant display name; the merge key.
    pub name: String,
    /// Last seen avatar.
    pub avatar: String,
    /// Points accumulated across every session of the month.
    pub monthly_score: i64,
}

/// Durable user profile consulted at join time and for bonus eligibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileEntity {
    /// User identity.
    pub user_id: String,
    /// Preferred display name.
    pub nickname: String,
    /// Preferred avatar.
    pub icon: String,
    /// Whether the bonus token of `counters_month` is still available.
    pub jolly_available: bool,
    /// Sessions attended during `counters_month`.
    pub monthly_quizzes_played: u32,
    /// Month key (`YYYY-MM`) the counter and the token belong to.
    #[serde(default)]
    pub counters_month: String,
}

impl ProfileEntity {
    /// Sessions attended during `month`; a stale counter reads as zero.
    pub fn quizzes_played_in(&self, month: &str) -> u32 {
        if self.counters_month == month {
            self.monthly_quizzes_played
        } else {
            0
        }
    }

    /// Whether the bonus is unused during `month`. Every month hands out a fresh token.
    pub fn jolly_available_in(&self, month: &str) -> bool {
        self.counters_month != month || self.jolly_available
    }

    /// Move the counters to `month`, starting them over when the month changed.
    pub fn roll_to(&mut self, month: &str) {
        if self.counters_month != month {
            self.counters_month = month.to_owned();
            self.monthly_quizzes_played = 0;
            self.jolly_available = true;
        }
    }
}

/// Privilege level attached to a host identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HostRole {
    /// Full control over sessions.
    Host,
    /// May watch the host view but not change anything.
    CoHost,
}

impl HostRole {
    /// Whether the role may mutate sessions.
    pub fn can_mutate(&self) -> bool {
        matches!(self, HostRole::Host)
    }
}

/// Single shared settings document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsEntity {
    /// Rules shown on the rules page.
    pub rules_text: String,
    /// Whether the monthly bonus can be activated at all.
    pub jolly_enabled: bool,
    /// Sessions ended during `held_month`.
    pub total_quizzes_held: u32,
    /// Month key (`YYYY-MM`) the held counter belongs to.
    #[serde(default)]
    pub held_month: String,
}

impl SettingsEntity {
    /// Sessions ended during `month`; a stale counter reads as zero.
    pub fn quizzes_held_in(&self, month: &str) -> u32 {
        if self.held_month == month {
            self.total_quizzes_held
        } else {
            0
        }
    }

    /// Move the held counter to `month`, starting it over when the month changed.
    pub fn roll_to(&mut self, month: &str) {
        if self.held_month != month {
            self.held_month = month.to_owned();
            self.total_quizzes_held = 0;
        }
    }
}

impl Default for SettingsEntity {
    fn default() -> Self {
        Self {
            rules_text: String::new(),
            jolly_enabled: true,
            total_quizzes_held: 0,
            held_month: String::new(),
        }
    }
}

/// Additive score delta for one participant, committed during settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreIncrement {
    /// Participant receiving the points.
    pub participant_id: ParticipantId,
    /// Points to add, possibly zero.
    pub delta: i64,
}

/// Final-score contribution of one participant to the monthly leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardContribution {
    /// Participant user identity, used for attendance bookkeeping.
    pub participant_id: ParticipantId,
    /// Merge key.
    pub name: String,
    /// Avatar to record as last seen.
    pub avatar: String,
    /// Points to add to `monthly_score`.
    pub points: i64,
}

/// Change notification emitted by a store after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// An answer document was created or updated.
    AnswerWritten {
        /// Owning session.
        quiz_id: QuizId,
        /// Question answered.
        question_id: QuestionId,
        /// Author of the answer.
        participant_id: ParticipantId,
    },
    /// The session document and its sub-collections were removed.
    QuizDeleted {
        /// Removed session.
        quiz_id: QuizId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(month: &str, played: u32, jolly_available: bool) -> ProfileEntity {
        ProfileEntity {
            user_id: "p1".into(),
            nickname: "Ada".into(),
            icon: String::new(),
            jolly_available,
            monthly_quizzes_played: played,
            counters_month: month.into(),
        }
    }

    #[test]
    fn stale_profile_counters_read_as_a_fresh_month() {
        let used = profile("2026-09", 4, false);
        assert_eq!(used.quizzes_played_in("2026-09"), 4);
        assert!(!used.jolly_available_in("2026-09"));
        assert_eq!(used.quizzes_played_in("2026-10"), 0);
        assert!(used.jolly_available_in("2026-10"));
    }

    #[test]
    fn rolling_resets_only_on_a_new_month() {
        let mut same = profile("2026-10", 2, false);
        same.roll_to("2026-10");
        assert_eq!(same, profile("2026-10", 2, false));

        let mut next = profile("2026-09", 2, false);
        next.roll_to("2026-10");
        assert_eq!(next, profile("2026-10", 0, true));

        let mut settings = SettingsEntity {
            total_quizzes_held: 5,
            held_month: "2026-09".into(),
            ..SettingsEntity::default()
        };
        assert_eq!(settings.quizzes_held_in("2026-10"), 0);
        settings.roll_to("2026-10");
        assert_eq!(settings.total_quizzes_held, 0);
        assert_eq!(settings.held_month, "2026-10");
    }
}
