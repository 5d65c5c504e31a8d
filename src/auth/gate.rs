//! Access gate: the single place that decides which routes need a session.
//!
//! Every request under the API router passes through [`access_gate`]. Routes in
//! [`PUBLIC_ROUTES`] go straight to their handler; anything else, including
//! routes added later, must present `Authorization: Bearer <token>`.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{error::AppError, state::AppState};

/// `(method, path)` pairs reachable without a credential. Paths are relative
/// to the API prefix and matched exactly.
pub const PUBLIC_ROUTES: &[(&str, &str)] = &[
    ("POST", "/auth/signup"),
    ("POST", "/auth/login"),
    ("POST", "/auth/request-reset"),
    ("POST", "/auth/reset"),
    ("GET", "/health"),
];

pub fn is_public(method: &Method, path: &str) -> bool {
    PUBLIC_ROUTES
        .iter()
        .any(|(m, p)| method.as_str() == *m && path == *p)
}

/// Pulls the token out of a two-part `Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Invalid Authorization header format"))?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AppError::unauthorized("Invalid Authorization header format")),
    }
}

pub async fn access_gate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_public(req.method(), req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let principal = state.auth.verify_token(bearer_token(req.headers())?)?;
    debug!(user_id = principal.id, "request authenticated");
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
