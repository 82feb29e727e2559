use std::time::SystemTime;

use tracing::info;

use crate::{
    dao::models::LeaderboardEntryEntity,
    dto::public::{ClearLeaderboardResponse, LeaderboardEntryView, LeaderboardResponse},
    error::ServiceError,
    services::{scoring, sse_events},
    state::SharedState,
};

/// Sort by monthly score, highest first, ties by name, and number the rows from 1.
pub fn rank_entries(mut entries: Vec<LeaderboardEntryEntity>) -> Vec<LeaderboardEntryView> {
    entries.sort_by(|a, b| {
        b.monthly_score
            .cmp(&a.monthly_score)
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| LeaderboardEntryView {
            rank: index + 1,
            name: entry.name,
            avatar: entry.avatar,
            monthly_score: entry.monthly_score,
        })
        .collect()
}

/// Ranked leaderboard of the current month.
pub async fn monthly_leaderboard(state: &SharedState) -> Result<LeaderboardResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let month = scoring::month_key(SystemTime::now());
    let entries = store.list_leaderboard(month.clone()).await?;
    Ok(LeaderboardResponse {
        month,
        entries: rank_entries(entries),
    })
}

/// Drop every entry of the current month.
pub async fn clear_current_month(
    state: &SharedState,
) -> Result<ClearLeaderboardResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let month = scoring::month_key(SystemTime::now());
    let removed = store.clear_leaderboard(month.clone()).await?;
    info!(%month, removed, "monthly leaderboard cleared");
    sse_events::broadcast_leaderboard_cleared(state, &month, removed);
    Ok(ClearLeaderboardResponse { month, removed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, monthly_score: i64) -> LeaderboardEntryEntity {
        LeaderboardEntryEntity {
            month: "2024-03".into(),
            name: name.into(),
            avatar: String::new(),
            monthly_score,
        }
    }

    #[test]
    fn ranks_by_score_then_name() {
        let ranked = rank_entries(vec![entry("Carla", 10), entry("Anna", 30), entry("Bruno", 10)]);
        let rows: Vec<_> = ranked
            .iter()
            .map(|row| (row.rank, row.name.as_str(), row.monthly_score))
            .collect();
        assert_eq!(rows, vec![(1, "Anna", 30), (2, "Bruno", 10), (3, "Carla", 10)]);
    }
}
