use std::convert::Infallible;

use axum::{
    Extension, Router,
    extract::State,
    middleware,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    routes::require_host_viewer,
    services::{
        access::HostIdentity,
        sse_service::{self, StreamKind},
    },
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    responses((status = 200, description = "Public SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream phase changes, joins, settlements and status updates to every client.
pub async fn public_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (receiver, handshake) = sse_service::subscribe_public(&state).await;
    info!("new public SSE connection");
    sse_service::to_sse_stream(receiver, StreamKind::Public, handshake)
}

#[utoipa::path(
    get,
    path = "/sse/host",
    tag = "sse",
    params(("x-user-id" = String, Header, description = "Host or co-host identity")),
    responses(
        (status = 200, description = "Host SSE stream", content_type = "text/event-stream", body = String),
        (status = 401, description = "Missing identity"),
        (status = 403, description = "Caller is not a host")
    )
)]
/// Stream answer ingestion and oracle verdicts to the host console.
pub async fn host_stream(
    State(state): State<SharedState>,
    Extension(identity): Extension<HostIdentity>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(user_id = %identity.user_id, role = ?identity.role, "new host SSE connection");
    let (receiver, handshake) = sse_service::subscribe_host(&state, identity.clone()).await;
    sse_service::to_sse_stream(receiver, StreamKind::Host(identity), handshake)
}

/// Configure the SSE endpoints.
pub fn router(state: SharedState) -> Router<SharedState> {
    let host = Router::<SharedState>::new()
        .route("/sse/host", get(host_stream))
        .route_layer(middleware::from_fn_with_state(state, require_host_viewer));

    Router::<SharedState>::new()
        .route("/sse/public", get(public_stream))
        .merge(host)
}
