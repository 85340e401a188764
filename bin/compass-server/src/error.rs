//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are converted to an
//! `{"error": "..."}` JSON body with an appropriate status code.
//!
//! Upstream model failures are shown to the caller verbatim: the chat page
//! displays them so the user knows the assistant, not their input, failed.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use compass_gateway::GatewayError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// All errors that can occur in the compass-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent a missing or empty message.
    #[error("{0}")]
    Validation(&'static str),

    /// The request body exceeded the size limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The model call failed (auth, quota, network, bad payload).
    #[error("{0}")]
    Upstream(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Upstream(m) => {
                warn!(error = %m, "model call failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        ServerError::Upstream(e.to_string())
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
