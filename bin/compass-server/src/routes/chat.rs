//! Chat routes.
//!
//! `/chat` answers a single question with no memory of earlier turns.
//! `/chat/stream` records the user's turn in the session history, prompts
//! with the whole (capped) history, and streams the reply as server-sent
//! events.  The streamed reply itself is not written back to the history.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::session::SessionId;
use crate::prompt::{build_prompt, build_single_turn_prompt};
use crate::relay;
use crate::schemas::chat::{ChatReply, ChatRequest, ErrorResponse, StatusResponse};
use crate::session::ConversationTurn;
use crate::state::AppState;

const NO_MESSAGE: &str = "No message provided";
const EMPTY_STREAM_MESSAGE: &str = "Please enter a message";

#[derive(OpenApi)]
#[openapi(
    paths(chat, chat_stream, clear),
    components(schemas(ChatRequest, ChatReply, ErrorResponse, StatusResponse))
)]
pub struct ChatApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .route("/clear", post(clear))
}

/// The `message` of a chat body.
///
/// Unparseable bodies read as no message; an oversized body is its own error.
fn message_of(
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Option<String>, ServerError> {
    match payload {
        Ok(Json(req)) => Ok(req.message),
        Err(JsonRejection::BytesRejection(e))
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE =>
        {
            Err(ServerError::PayloadTooLarge(e.body_text()))
        }
        Err(e) => {
            debug!(rejection = %e, "unreadable chat body");
            Ok(None)
        }
    }
}

/// Single-shot chat (`POST /chat`).
///
/// A body that is not JSON, or lacks a string `message`, counts as an empty
/// message.
#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply generated", body = ChatReply),
        (status = 400, description = "Missing or empty message", body = ErrorResponse),
        (status = 413, description = "Body too large", body = ErrorResponse),
        (status = 500, description = "Model call failed", body = ErrorResponse),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ServerError> {
    let message = message_of(payload)?
        .filter(|m| !m.is_empty())
        .ok_or(ServerError::Validation(NO_MESSAGE))?;

    debug!(message_len = message.len(), "chat request");
    let prompt = build_single_turn_prompt(&state.config.company_context, &message);
    let reply = state.gateway.generate(&prompt).await?;

    info!(reply_len = reply.len(), "chat reply generated");
    Ok(Json(ChatReply {
        reply: reply.trim().to_owned(),
    }))
}

/// Streaming chat (`POST /chat/stream`).
///
/// Each fragment is one `data:` event; the stream ends with `data: [DONE]`,
/// or with `data: [ERROR] <message>` if the model fails part-way.
#[utoipa::path(
    post,
    path = "/chat/stream",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Missing or blank message", body = ErrorResponse),
        (status = 413, description = "Body too large", body = ErrorResponse),
    )
)]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let message = message_of(payload)?
        .map(|m| m.trim().to_owned())
        .filter(|m| !m.is_empty())
        .ok_or(ServerError::Validation(EMPTY_STREAM_MESSAGE))?;

    // History is persisted before the model is called.
    state
        .history
        .append(session.as_str(), ConversationTurn::user(message))
        .await;
    let history = state.history.get(session.as_str()).await;
    let prompt = build_prompt(&state.config.company_context, &history);
    debug!(
        session_id = %session.as_str(),
        turns = history.len(),
        prompt_len = prompt.len(),
        "streaming chat request"
    );

    let events = relay::frames(state.gateway.generate_stream(prompt))
        .map(|frame| Ok::<Event, Infallible>(frame.into_event()));

    let mut response = Sse::new(events).into_response();
    // Ask reverse proxies not to buffer the event stream.
    response
        .headers_mut()
        .insert("x-accel-buffering", HeaderValue::from_static("no"));
    Ok(response)
}

/// Forget the session's conversation (`POST /clear`).
#[utoipa::path(
    post,
    path = "/clear",
    tag = "chat",
    responses(
        (status = 200, description = "History cleared", body = StatusResponse),
    )
)]
pub async fn clear(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
) -> Json<StatusResponse> {
    state.history.clear(session.as_str()).await;
    Json(StatusResponse {
        status: "cleared".into(),
    })
}
