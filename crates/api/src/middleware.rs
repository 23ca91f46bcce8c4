use std::sync::Arc;

use axum::{extract::State, middleware::Next, response::Response};
use chrono::Utc;

use warden_auth::{Caller, DenialReason, JwtValidator};

use crate::context::CallerContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Attach a [`CallerContext`] to every request.
///
/// Never rejects: handlers decide, so that every denial flows through the
/// authorization decision and renders the same way.
pub async fn caller_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let caller = match req.headers().get(axum::http::header::AUTHORIZATION) {
        None => Caller::from_authorization_header(None, state.jwt.as_ref(), Utc::now()),
        Some(value) => match value.to_str() {
            Ok(header) => Caller::from_authorization_header(Some(header), state.jwt.as_ref(), Utc::now()),
            Err(_) => Caller::Rejected(DenialReason::TokenMalformed),
        },
    };

    req.extensions_mut().insert(CallerContext::new(caller));
    next.run(req).await
}
