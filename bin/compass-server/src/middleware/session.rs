//! Cookie-based session identity.
//!
//! Each browser carries an opaque `compass_session` cookie holding a v4 UUID.
//! [`session_middleware`] accepts a well-formed token or issues a fresh one,
//! hands it to handlers as a [`SessionId`] extension, and re-sets the cookie
//! on every response so its expiry slides forward with activity.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "compass_session";

/// Opaque session token of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let session = match session_from_headers(req.headers()) {
        Some(id) => id,
        None => {
            let id = SessionId(Uuid::new_v4().to_string());
            debug!(session_id = %id.0, "issuing new session");
            id
        }
    };
    let cookie = set_cookie_value(&session, state.config.session_ttl.as_secs());
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;
    match HeaderValue::from_str(&cookie) {
        Ok(v) => {
            response.headers_mut().append(header::SET_COOKIE, v);
        }
        Err(e) => warn!(error = %e, "failed to encode session cookie"),
    }
    response
}

/// Extract a valid session token from the `Cookie` headers, if any.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim_matches('"')).ok())
        .map(|id| SessionId(id.to_string()))
}

fn set_cookie_value(session: &SessionId, max_age_secs: u64) -> String {
    format!(
        "{SESSION_COOKIE}={}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax",
        session.0
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────
