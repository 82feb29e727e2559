use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage reachability and the session phase, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_quiz_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let phase = state.phase().await.into();
    if state.is_degraded() {
        HealthResponse::degraded(phase)
    } else {
        HealthResponse::ok(phase)
    }
}
