use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::phase::VisiblePhase;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Phase of the session driven by this server.
    pub phase: VisiblePhase,
}

impl HealthResponse {
    /// Storage reachable.
    pub fn ok(phase: VisiblePhase) -> Self {
        Self {
            status: "ok".into(),
            phase,
        }
    }

    /// Running without storage.
    pub fn degraded(phase: VisiblePhase) -> Self {
        Self {
            status: "degraded".into(),
            phase,
        }
    }
}
