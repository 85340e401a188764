//! [`ModelGateway`] backed by the Google Generative Language REST API.
//!
//! Non-streaming calls go to `models/{model}:generateContent`; streaming calls
//! go to `models/{model}:streamGenerateContent?alt=sse`, whose body is an
//! event stream of partial `GenerateContentResponse` objects.
//!
//! The streaming body is pumped by a spawned task into a bounded channel.  The
//! task stops as soon as the receiving side is dropped, which is how a client
//! disconnect on the HTTP side releases the upstream connection.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

use crate::sse::SseDecoder;
use crate::{FragmentStream, GatewayError, ModelGateway};

/// Default public endpoint of the Generative Language API.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Fragments buffered between the upstream reader and the HTTP response.
const FRAGMENT_BUFFER: usize = 32;

/// Connection settings for [`GeminiGateway`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Model identifier, e.g. `"gemini-2.5-flash"`.
    pub model: String,
    /// Scheme + host (+ optional prefix) of the API, without trailing slash.
    pub api_base: String,
}

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiGateway {
    client: Client,
    config: GeminiConfig,
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("model", &self.config.model)
            .field("api_base", &self.config.api_base)
            .finish_non_exhaustive()
    }
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(concat!("compass-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, mut config: GeminiConfig) -> Self {
        while config.api_base.ends_with('/') {
            config.api_base.pop();
        }
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn url(&self, action: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.api_base, self.config.model, action
        )
    }

    fn request(&self, url: String, prompt: &str) -> RequestBuilder {
        self.client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&GenerateContentRequest::from_prompt(prompt))
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        debug!(model = %self.config.model, prompt_len = prompt.len(), "generateContent");
        let response = self
            .request(self.url("generateContent"), prompt)
            .send()
            .await?;
        let text = ensure_success(response).await?.text().await?;
        trace!("response: {text}");

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        let reply = parsed.text();
        if reply.is_empty() {
            return Err(GatewayError::Empty(parsed.empty_reason()));
        }
        Ok(reply)
    }

    fn generate_stream(&self, prompt: String) -> FragmentStream {
        debug!(model = %self.config.model, prompt_len = prompt.len(), "streamGenerateContent");
        let request = self.request(
            format!("{}?alt=sse", self.url("streamGenerateContent")),
            &prompt,
        );
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        tokio::spawn(async move {
            if let Err(e) = pump(request, &tx).await {
                warn!(error = %e, "model stream failed");
                // The receiver may already be gone; nothing left to tell.
                let _ = tx.send(Err(e)).await;
            }
        });
        ReceiverStream::new(rx).boxed()
    }
}

/// Read the upstream event stream and forward every non-empty text fragment.
///
/// Returns `Ok(())` when the upstream finishes or the consumer hangs up.
async fn pump(
    request: RequestBuilder,
    tx: &mpsc::Sender<Result<String, GatewayError>>,
) -> Result<(), GatewayError> {
    let response = ensure_success(request.send().await?).await?;
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!("stream consumer dropped; releasing upstream");
                return Ok(());
            }
            next = body.next() => next,
        };
        let Some(chunk) = next else { break };
        for payload in decoder.feed(&chunk?) {
            if !forward(&payload, tx).await? {
                return Ok(());
            }
        }
    }

    if let Some(payload) = decoder.finish() {
        forward(&payload, tx).await?;
    }
    Ok(())
}

/// Decode one event payload and send its text.  Returns `false` once the
/// consumer is gone.
async fn forward(
    payload: &str,
    tx: &mpsc::Sender<Result<String, GatewayError>>,
) -> Result<bool, GatewayError> {
    trace!("chunk: {payload}");
    let parsed: GenerateContentResponse = serde_json::from_str(payload)?;
    if let Some(err) = parsed.error {
        return Err(GatewayError::Api {
            status: err.code.unwrap_or(500),
            message: err.message,
        });
    }
    let text = parsed.text();
    if text.is_empty() {
        return Ok(true);
    }
    Ok(tx.send(Ok(text)).await.is_ok())
}

/// Turn a non-2xx response into [`GatewayError::Api`], keeping the upstream
/// `error.message` when the body carries one.
async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_owned()
            } else {
                body.trim().to_owned()
            }
        });
    Err(GatewayError::Api {
        status: status.as_u16(),
        message,
    })
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

impl<'a> GenerateContentRequest<'a> {
    fn from_prompt(prompt: &'a str) -> Self {
        Self {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn empty_reason(&self) -> String {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return format!("prompt blocked: {reason}");
        }
        match self.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            Some(reason) => format!("finish reason: {reason}"),
            None => "no candidates".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<u16>,
    message: String,
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::body::Body;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    const KEY: &str = "test-key";

    fn reply(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    /// Imitates both Gemini endpoints for the `gemini-test` model.
    async fn fake_api(headers: HeaderMap, Json(body): Json<Value>) -> axum::response::Response {
        use axum::response::IntoResponse;

        if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(KEY) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT"
                }})),
            )
                .into_response();
        }

        let prompt = body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_owned();
        match prompt.as_str() {
            "blocked" => Json(json!({
                "candidates": [],
                "promptFeedback": { "blockReason": "SAFETY" }
            }))
            .into_response(),
            _ => Json(reply(&format!("echo: {prompt}"))).into_response(),
        }
    }

    async fn fake_stream(Json(body): Json<Value>) -> axum::response::Response {
        use axum::response::IntoResponse;

        let prompt = body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_owned();
        let mut events = String::new();
        for piece in ["Dubai, ", "", "UAE"] {
            events.push_str(&format!("data: {}\r\n\r\n", reply(piece)));
        }
        if prompt == "fail midway" {
            events.push_str(&format!(
                "data: {}\r\n\r\n",
                json!({ "error": { "code": 503, "message": "model overloaded" } })
            ));
        }
        ([("content-type", "text/event-stream")], events).into_response()
    }

    async fn spawn_fake() -> String {
        let app = Router::new()
            .route("/v1beta/models/gemini-test:generateContent", post(fake_api))
            .route(
                "/v1beta/models/gemini-test:streamGenerateContent",
                post(fake_stream),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    async fn gateway(key: &str) -> GeminiGateway {
        GeminiGateway::new(GeminiConfig {
            api_key: key.into(),
            model: "gemini-test".into(),
            api_base: spawn_fake().await,
        })
        .unwrap()
    }

    async fn collect(mut stream: FragmentStream) -> (Vec<String>, Option<String>) {
        let mut fragments = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(text) => fragments.push(text),
                Err(e) => return (fragments, Some(e.to_string())),
            }
        }
        (fragments, None)
    }

    #[tokio::test]
    async fn generate_returns_candidate_text() {
        let gw = gateway(KEY).await;
        let text = gw.generate("hello").await.unwrap();
        assert_eq!(text, "echo: hello");
    }

    #[tokio::test]
    async fn generate_surfaces_upstream_error_message() {
        let gw = gateway("wrong").await;
        let err = gw.generate("hello").await.unwrap_err();
        match &err {
            GatewayError::Api { status, message } => {
                assert_eq!(*status, 400);
                assert!(message.starts_with("API key not valid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("API key not valid"));
    }

    #[tokio::test]
    async fn generate_reports_blocked_prompt() {
        let gw = gateway(KEY).await;
        let err = gw.generate("blocked").await.unwrap_err();
        assert!(matches!(err, GatewayError::Empty(ref r) if r.contains("SAFETY")));
    }

    #[tokio::test]
    async fn stream_yields_non_empty_fragments_in_order() {
        let gw = gateway(KEY).await;
        let (fragments, error) = collect(gw.generate_stream("hi".into())).await;
        assert_eq!(fragments, vec!["Dubai, ", "UAE"]);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn stream_error_event_terminates_stream() {
        let gw = gateway(KEY).await;
        let (fragments, error) = collect(gw.generate_stream("fail midway".into())).await;
        assert_eq!(fragments.concat(), "Dubai, UAE");
        assert!(error.unwrap().contains("model overloaded"));
    }

    #[tokio::test]
    async fn stream_connection_failure_is_delivered_in_band() {
        let gw = GeminiGateway::new(GeminiConfig {
            api_key: KEY.into(),
            model: "gemini-test".into(),
            // Port 9 (discard) is not expected to have a listener.
            api_base: "http://127.0.0.1:9".into(),
        })
        .unwrap();
        let (fragments, error) = collect(gw.generate_stream("hi".into())).await;
        assert!(fragments.is_empty());
        assert!(error.is_some());
    }

    #[test]
    fn request_body_wraps_prompt_as_single_user_turn() {
        let body = serde_json::to_value(GenerateContentRequest::from_prompt("p")).unwrap();
        assert_eq!(
            body,
            json!({ "contents": [{ "role": "user", "parts": [{ "text": "p" }] }] })
        );
    }

    #[test]
    fn text_concatenates_all_parts_of_first_candidate() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "a" }, { "text": "b" }] } }]
        }))
        .unwrap();
        assert_eq!(parsed.text(), "ab");
    }

    /// Sets its flag when the upstream response body is dropped.
    struct ReleaseFlag(Arc<AtomicBool>);

    impl Drop for ReleaseFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Upstream that streams a fragment every 20 ms and never finishes.
    async fn spawn_endless(released: Arc<AtomicBool>, produced: Arc<AtomicUsize>) -> String {
        let handler = move || {
            let guard = ReleaseFlag(released.clone());
            let produced = produced.clone();
            async move {
                let events = futures::stream::unfold((guard, 0usize), move |(guard, i)| {
                    let produced = produced.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        produced.fetch_add(1, Ordering::SeqCst);
                        let event = format!("data: {}\n\n", reply(&format!("f{i} ")));
                        Some((Ok::<_, Infallible>(event), (guard, i + 1)))
                    }
                });
                (
                    [("content-type", "text/event-stream")],
                    Body::from_stream(events),
                )
            }
        };
        let app = Router::new().route(
            "/v1beta/models/gemini-test:streamGenerateContent",
            post(handler),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn dropping_stream_releases_upstream() {
        let released = Arc::new(AtomicBool::new(false));
        let produced = Arc::new(AtomicUsize::new(0));
        let gw = GeminiGateway::new(GeminiConfig {
            api_key: KEY.into(),
            model: "gemini-test".into(),
            api_base: spawn_endless(released.clone(), produced.clone()).await,
        })
        .unwrap();

        let mut stream = gw.generate_stream("go on forever".into());
        assert_eq!(stream.next().await.unwrap().unwrap(), "f0 ");
        assert_eq!(stream.next().await.unwrap().unwrap(), "f1 ");
        drop(stream);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !released.load(Ordering::SeqCst) {
            assert!(Instant::now() < deadline, "upstream body never dropped");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let at_release = produced.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(produced.load(Ordering::SeqCst), at_release);
    }
}
