//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - chat page (`/`), health (`/health`) and OpenAPI document routes
//! - chat routes, wrapped in the session-cookie middleware
//! - panic catching, CORS and per-request trace-ID layers

pub mod chat;
pub mod doc;
pub mod health;
pub mod page;


use std::any::Any;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::{Router, middleware};
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::ServerError;
use crate::middleware::{cors, session, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let chat_router = chat::router().layer(middleware::from_fn_with_state(
        state.clone(),
        session::session_middleware,
    ));

    Router::new()
        .merge(page::router())
        .merge(health::router())
        .merge(doc::router())
        .merge(chat_router)
        // Outermost layers execute first on the way in.
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors::cors_layer(&state))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

/// Turn a handler panic into the usual JSON error body.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "handler panicked".to_owned()
    };
    ServerError::Internal(detail).into_response()
}
