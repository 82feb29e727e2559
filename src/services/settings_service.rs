use std::time::SystemTime;

use tracing::info;

use crate::{
    dto::public::{SettingsView, UpdateSettingsRequest},
    error::ServiceError,
    services::scoring,
    state::SharedState,
};

/// Shared rules/settings document.
pub async fn get_settings(state: &SharedState) -> Result<SettingsView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let month = scoring::month_key(SystemTime::now());
    Ok(SettingsView::for_month(store.find_settings().await?, &month))
}

/// Update the rules text and the bonus switch. The held-session counter is not editable.
pub async fn update_settings(
    state: &SharedState,
    request: UpdateSettingsRequest,
) -> Result<SettingsView, ServiceError> {
    let store = state.require_quiz_store().await?;
    let mut settings = store.find_settings().await?;

    if let Some(rules_text) = request.rules_text {
        settings.rules_text = rules_text;
    }
    if let Some(jolly_enabled) = request.jolly_enabled {
        settings.jolly_enabled = jolly_enabled;
    }

    store.save_settings(settings.clone()).await?;
    info!(jolly_enabled = settings.jolly_enabled, "settings updated");
    let month = scoring::month_key(SystemTime::now());
    Ok(SettingsView::for_month(settings, &month))
}
