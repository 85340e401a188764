//! Model gateway for compass-chat.
//!
//! [`ModelGateway`] is the only surface the HTTP layer sees of the upstream
//! generative model: one call that returns the whole reply and one that
//! yields the reply as an ordered sequence of text fragments.
//!
//! The production implementation is [`GeminiGateway`], which talks to the
//! Google Generative Language REST API.  Tests substitute their own
//! implementation of the trait.

pub mod error;
pub mod gemini;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use error::GatewayError;
pub use gemini::{GeminiConfig, GeminiGateway};

/// Ordered, finite sequence of reply fragments.
///
/// Every `Ok` item is a non-empty piece of text.  An `Err` item is terminal:
/// implementations stop producing after it.  Dropping the stream releases the
/// upstream connection.
pub type FragmentStream = BoxStream<'static, Result<String, GatewayError>>;

/// Opaque capability over the external generative model.
#[async_trait]
pub trait ModelGateway: Send + Sync + 'static {
    /// Run the prompt to completion and return the full reply text.
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;

    /// Start generating and return the reply as it arrives.
    ///
    /// Failures, including those that happen before the first fragment, are
    /// delivered in-band as the last item of the stream.
    fn generate_stream(&self, prompt: String) -> FragmentStream;
}
