use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, header};
use axum::middleware::Next;
use axum::response::Response;
use fincontrol_application::{ActorContext, run_as_actor};
use fincontrol_core::{AppError, UserIdentity};

use crate::error::ApiResult;
use crate::state::AppState;

/// Resolves the caller and runs the rest of the request as that actor.
///
/// The identity is asserted by the upstream identity provider through a
/// trusted header. Every repository call made while handling the request
/// observes the resulting actor context.
pub async fn require_actor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = identity_from_headers(request.headers(), &state.identity_header)?;
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| *address);
    let context = actor_context_for(&identity, request.headers(), peer);

    request.extensions_mut().insert(identity);
    Ok(run_as_actor(context, next.run(request)).await)
}

fn identity_from_headers(headers: &HeaderMap, name: &HeaderName) -> Result<UserIdentity, AppError> {
    let subject = headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    UserIdentity::from_subject(subject)
}

fn actor_context_for(
    identity: &UserIdentity,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> ActorContext {
    ActorContext {
        user_id: Some(identity.subject().to_owned()),
        ip: client_ip(headers, peer),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned),
    }
}

/// Returns the first `x-forwarded-for` hop, falling back to the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .or_else(|| peer.map(|address| address.ip().to_string()))
}
