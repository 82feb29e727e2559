//! Pure scoring rules: per-answer points, settlement deltas and leaderboard contributions.

use std::{
    hash::{DefaultHasher, Hash, Hasher},
    time::SystemTime,
};

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use time::OffsetDateTime;

use crate::{
    dao::models::{AnswerEntity, LeaderboardContribution, ParticipantEntity, ScoreIncrement},
    state::quiz::{Question, QuestionKind},
};

/// Multiplier applied to the final total of a participant with the bonus engaged.
pub const JOLLY_MULTIPLIER: i64 = 2;

/// Points earned by a submission at the time it is made.
///
/// Choice questions compare the text with the reference option, reorder questions compare the
/// submitted order element by element. Free-text questions start at zero and are scored by the
/// host.
pub fn score_answer(
    question: &Question,
    answer_text: &str,
    answer_order: Option<&[String]>,
    reward: i64,
) -> i64 {
    let correct = match &question.kind {
        QuestionKind::MultipleChoice { correct_answer, .. }
        | QuestionKind::MediaMultipleChoice { correct_answer, .. } => {
            answer_text == correct_answer
        }
        QuestionKind::Reorder { correct_order, .. } => answer_order == Some(correct_order.as_slice()),
        QuestionKind::OpenEnded { .. } | QuestionKind::MediaOpenEnded { .. } => false,
    };

    if correct { reward } else { 0 }
}

/// Seconds between `started_at` and `now`, never negative, rounded to two decimals.
pub fn response_time(started_at: Option<SystemTime>, now: SystemTime) -> f64 {
    let Some(started_at) = started_at else {
        return 0.0;
    };
    let elapsed = now
        .duration_since(started_at)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    (elapsed * 100.0).round() / 100.0
}

/// Text stored alongside a reorder submission.
pub fn render_order(order: &[String]) -> String {
    format!("Ordine: {}", order.join(", "))
}

/// Interpret a manual score typed by the host.
///
/// Numbers are truncated, strings are read like a leading integer (`"12pts"` is 12).
/// Anything negative or unreadable becomes 0.
pub fn parse_score_override(value: &serde_json::Value) -> i64 {
    let parsed = match value {
        serde_json::Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        serde_json::Value::String(text) => leading_integer(text),
        _ => None,
    };
    parsed.unwrap_or(0).max(0)
}

fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// One increment per participant: the stored score of their answer, zero when they did not
/// answer.
pub fn settlement_increments(
    participants: &[ParticipantEntity],
    answers: &[AnswerEntity],
) -> Vec<ScoreIncrement> {
    participants
        .iter()
        .map(|participant| ScoreIncrement {
            participant_id: participant.id.clone(),
            delta: answers
                .iter()
                .find(|answer| answer.participant_id == participant.id)
                .map(|answer| answer.score.max(0))
                .unwrap_or(0),
        })
        .collect()
}

/// Final totals to fold into the monthly leaderboard, bonus applied once here.
pub fn leaderboard_contributions(participants: &[ParticipantEntity]) -> Vec<LeaderboardContribution> {
    participants
        .iter()
        .map(|participant| LeaderboardContribution {
            participant_id: participant.id.clone(),
            name: participant.name.clone(),
            avatar: participant.avatar.clone(),
            points: if participant.jolly_active {
                participant.score * JOLLY_MULTIPLIER
            } else {
                participant.score
            },
        })
        .collect()
}

/// Leaderboard bucket of `now`, formatted `YYYY-MM` (UTC).
pub fn month_key(now: SystemTime) -> String {
    let date = OffsetDateTime::from(now);
    format!("{:04}-{:02}", date.year(), u8::from(date.month()))
}

/// A participant may use the bonus only when the feature is on and they missed at least one
/// session this month.
pub fn is_jolly_eligible(jolly_enabled: bool, quizzes_played: u32, quizzes_held: u32) -> bool {
    jolly_enabled && quizzes_played < quizzes_held
}

/// Options of a question in the order a given participant sees them.
///
/// Reorder questions are shuffled with a seed derived from the participant and question, so
/// the same participant always gets the same arrangement. Other kinds keep the authored order.
pub fn presented_options(question: &Question, participant_id: &str) -> Vec<String> {
    let mut options = question.options().to_vec();
    if question.is_reorder() {
        let mut hasher = DefaultHasher::new();
        participant_id.hash(&mut hasher);
        question.id.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        options.shuffle(&mut rng);
    }
    options
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn choice() -> Question {
        Question {
            id: "q1".into(),
            text: "What is the capital of France?".into(),
            kind: QuestionKind::MultipleChoice {
                options: strings(&["Paris", "Rome"]),
                correct_answer: "Paris".into(),
            },
        }
    }

    fn reorder() -> Question {
        Question {
            id: "q2".into(),
            text: "Sort these numbers ascending".into(),
            kind: QuestionKind::Reorder {
                options: strings(&["3", "1", "2"]),
                correct_order: strings(&["1", "2", "3"]),
            },
        }
    }

    fn participant(id: &str, score: i64, jolly_active: bool) -> ParticipantEntity {
        ParticipantEntity {
            quiz_id: "quiz".into(),
            id: id.into(),
            name: format!("name-{id}"),
            avatar: "avatar".into(),
            score,
            jolly_active,
            jolly_available: !jolly_active,
            joined_at: SystemTime::UNIX_EPOCH,
        }
    }

    fn answer(participant_id: &str, score: i64) -> AnswerEntity {
        AnswerEntity {
            quiz_id: "quiz".into(),
            question_id: "q1".into(),
            participant_id: participant_id.into(),
            answer_text: "Paris".into(),
            answer_order: None,
            response_time: 1.0,
            score,
            is_cheating: None,
            cheating_reason: None,
            submitted_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn choice_answers_score_on_exact_match() {
        assert_eq!(score_answer(&choice(), "Paris", None, 10), 10);
        assert_eq!(score_answer(&choice(), "Rome", None, 10), 0);
        assert_eq!(score_answer(&choice(), "paris", None, 10), 0);
    }

    #[test]
    fn reorder_scores_only_the_exact_permutation() {
        let question = reorder();
        let target = strings(&["1", "2", "3"]);
        assert_eq!(score_answer(&question, "", Some(&target), 10), 10);

        for wrong in [["1", "3", "2"], ["2", "1", "3"], ["3", "2", "1"], ["3", "1", "2"]] {
            let order = strings(&wrong);
            assert_eq!(score_answer(&question, "", Some(&order), 10), 0, "{wrong:?}");
        }
        assert_eq!(score_answer(&question, "", None, 10), 0);
    }

    #[test]
    fn open_ended_starts_at_zero() {
        let question = Question {
            id: "q3".into(),
            text: "Describe your favourite dish".into(),
            kind: QuestionKind::OpenEnded {
                correct_answer: "Pizza".into(),
            },
        };
        assert_eq!(score_answer(&question, "Pizza", None, 10), 0);
    }

    #[test]
    fn response_time_is_rounded_and_clamped() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        assert_eq!(response_time(Some(start), start + Duration::from_millis(3_456)), 3.46);
        assert_eq!(response_time(Some(start), start - Duration::from_secs(1)), 0.0);
        assert_eq!(response_time(None, start), 0.0);
    }

    #[test]
    fn score_override_parsing() {
        assert_eq!(parse_score_override(&json!(7)), 7);
        assert_eq!(parse_score_override(&json!(7.9)), 7);
        assert_eq!(parse_score_override(&json!("12pts")), 12);
        assert_eq!(parse_score_override(&json!("  5")), 5);
        assert_eq!(parse_score_override(&json!(-3)), 0);
        assert_eq!(parse_score_override(&json!("-3")), 0);
        assert_eq!(parse_score_override(&json!("abc")), 0);
        assert_eq!(parse_score_override(&json!(null)), 0);
    }

    #[test]
    fn participants_without_answer_contribute_zero() {
        let participants = vec![participant("p1", 0, false), participant("p2", 0, false)];
        let increments = settlement_increments(&participants, &[answer("p1", 10)]);
        assert_eq!(
            increments,
            vec![
                ScoreIncrement {
                    participant_id: "p1".into(),
                    delta: 10
                },
                ScoreIncrement {
                    participant_id: "p2".into(),
                    delta: 0
                },
            ]
        );
    }

    #[test]
    fn jolly_doubles_only_the_leaderboard_contribution() {
        let participants = vec![participant("p1", 20, true), participant("p2", 10, false)];
        let contributions = leaderboard_contributions(&participants);
        assert_eq!(contributions[0].points, 40);
        assert_eq!(contributions[1].points, 10);
        assert_eq!(participants[0].score, 20);
    }

    #[test]
    fn month_key_format() {
        // 2024-03-15T00:00:00Z
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_710_460_800);
        assert_eq!(month_key(at), "2024-03");
    }

    #[test]
    fn jolly_requires_a_missed_session() {
        assert!(is_jolly_eligible(true, 1, 3));
        assert!(!is_jolly_eligible(true, 3, 3));
        assert!(!is_jolly_eligible(false, 0, 3));
    }

    #[test]
    fn reorder_options_are_shuffled_deterministically() {
        let question = reorder();
        let first = presented_options(&question, "p1");
        assert_eq!(first, presented_options(&question, "p1"));

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, strings(&["1", "2", "3"]));

        assert_eq!(presented_options(&choice(), "p1"), strings(&["Paris", "Rome"]));
    }
}
