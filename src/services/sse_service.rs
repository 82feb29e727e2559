use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::access::HostIdentity,
    state::SharedState,
};

/// Event name of the first message on every stream.
pub const EVENT_HANDSHAKE: &str = "handshake";

/// Which hub a stream follows.
#[derive(Clone, Debug)]
pub enum StreamKind {
    /// Everyone, no identity required.
    Public,
    /// Hosts and co-hosts.
    Host(HostIdentity),
}

impl StreamKind {
    fn label(&self) -> &'static str {
        match self {
            StreamKind::Public => "public",
            StreamKind::Host(_) => "host",
        }
    }
}

/// Subscribe to the public stream, returning the receiver and its handshake.
pub async fn subscribe_public(
    state: &SharedState,
) -> (broadcast::Receiver<ServerEvent>, ServerEvent) {
    let receiver = state.public_sse().subscribe();
    (receiver, handshake(state, &StreamKind::Public).await)
}

/// Subscribe to the host stream. Authorization happens in the route layer.
pub async fn subscribe_host(
    state: &SharedState,
    identity: HostIdentity,
) -> (broadcast::Receiver<ServerEvent>, ServerEvent) {
    let receiver = state.host_sse().subscribe();
    let kind = StreamKind::Host(identity);
    (receiver, handshake(state, &kind).await)
}

async fn handshake(state: &SharedState, kind: &StreamKind) -> ServerEvent {
    let payload = Handshake {
        stream: kind.label().to_owned(),
        message: format!("connected to the {} stream", kind.label()),
        degraded: state.is_degraded(),
        phase: state.phase().await.into(),
    };
    ServerEvent::json(Some(EVENT_HANDSHAKE.to_owned()), &payload).unwrap_or_else(|err| {
        warn!(error = %err, "failed to serialize SSE handshake");
        ServerEvent::new(Some(EVENT_HANDSHAKE.to_owned()), String::from("{}"))
    })
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Convert a broadcast receiver into an SSE response. The handshake goes out first.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
    handshake: ServerEvent,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(handshake))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(stream = kind.label(), skipped, "SSE client lagged");
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Public => info!("public SSE stream disconnected"),
            StreamKind::Host(identity) => {
                info!(user_id = %identity.user_id, role = ?identity.role, "host SSE stream disconnected")
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, oracle::UnconfiguredOracle, state::AppState};

    #[tokio::test]
    async fn handshake_reports_phase_and_degraded_flag() {
        let state = AppState::new(AppConfig::ephemeral(), Arc::new(UnconfiguredOracle));
        let (_receiver, handshake) = subscribe_public(&state).await;

        assert_eq!(handshake.event.as_deref(), Some(EVENT_HANDSHAKE));
        let body: serde_json::Value = serde_json::from_str(&handshake.data).unwrap();
        assert_eq!(body["stream"], "public");
        assert_eq!(body["degraded"], true);
        assert_eq!(body["phase"], "authoring");
    }
}
