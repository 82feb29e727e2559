use axum::{
    Router,
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, services::access, state::SharedState};

/// Swagger UI.
pub mod docs;
/// Health check.
pub mod health;
/// Host authoring and session control.
pub mod host;
/// Joining, answering and the bonus.
pub mod participant;
/// Leaderboard and settings.
pub mod public;
/// Event streams.
pub mod sse;

/// Header carrying the identity asserted by the upstream authenticator.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router(state.clone()))
        .merge(host::router(state.clone()))
        .merge(participant::router())
        .merge(public::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// Caller identity taken from the [`USER_ID_HEADER`] header.
#[derive(Debug, Clone)]
pub struct CallerId(pub String);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_id(parts.headers.get(USER_ID_HEADER)).map(CallerId)
    }
}

fn caller_id(value: Option<&axum::http::HeaderValue>) -> Result<String, AppError> {
    value
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AppError::Unauthorized(format!("missing `{USER_ID_HEADER}` header")))
}

async fn require_host(
    state: &SharedState,
    mut req: Request<Body>,
    next: Next,
    mutate: bool,
) -> Result<Response, AppError> {
    let user_id = caller_id(req.headers().get(USER_ID_HEADER))?;
    let identity = access::authorize_host(state, &user_id, mutate).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Hosts and co-hosts.
async fn require_host_viewer(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    require_host(&state, req, next, false).await
}

/// Full hosts only.
async fn require_host_mutator(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    require_host(&state, req, next, true).await
}
