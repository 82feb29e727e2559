use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::SettingsEntity;

/// One ranked row of the monthly leaderboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntryView {
    /// 1-based position.
    pub rank: usize,
    /// Display name.
    pub name: String,
    /// Last seen avatar.
    pub avatar: String,
    /// Points accumulated this month.
    pub monthly_score: i64,
}

/// Monthly leaderboard sorted by score.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Month bucket, `YYYY-MM`.
    pub month: String,
    /// Rows ranked by score.
    pub entries: Vec<LeaderboardEntryView>,
}

/// Outcome of a leaderboard reset.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClearLeaderboardResponse {
    /// Month bucket that was cleared.
    pub month: String,
    /// Number of entries removed.
    pub removed: u64,
}

/// Shared rules/settings document.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsView {
    /// Rules shown on the rules page.
    pub rules_text: String,
    /// Whether the bonus can be activated.
    pub jolly_enabled: bool,
    /// Sessions ended this month.
    pub total_quizzes_held: u32,
}

impl SettingsView {
    /// Settings as seen during `month`.
    pub fn for_month(value: SettingsEntity, month: &str) -> Self {
        Self {
            total_quizzes_held: value.quizzes_held_in(month),
            rules_text: value.rules_text,
            jolly_enabled: value.jolly_enabled,
        }
    }
}

/// Partial settings update; absent fields are left untouched.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateSettingsRequest {
    /// Replacement rules text.
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub rules_text: Option<String>,
    /// New bonus switch.
    #[serde(default)]
    pub jolly_enabled: Option<bool>,
}
