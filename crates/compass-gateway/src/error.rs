use thiserror::Error;

/// Errors raised while talking to the upstream model.
///
/// The `Display` text is what callers surface to the browser, so every
/// variant renders a readable one-line message.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure, TLS failure, or a broken response body.
    #[error("request to model API failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// A response payload could not be decoded.
    #[error("malformed model API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The API answered successfully but produced no text, e.g. because the
    /// prompt or the candidate was blocked.
    #[error("model returned no text ({0})")]
    Empty(String),
}
