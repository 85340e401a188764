//! Request / response bodies of the chat endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The user's message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Successful `POST /chat` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatReply {
    /// The assistant's reply, trimmed of surrounding whitespace.
    pub reply: String,
}

/// Error body returned with every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// `POST /clear` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// Always `"cleared"`.
    pub status: String,
}
