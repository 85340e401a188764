//! Fragment stream → server-sent event frames.
//!
//! A relayed stream is every fragment in production order followed by exactly
//! one terminal frame: `[DONE]` when the gateway finishes, or
//! `[ERROR] <message>` when it fails.  Nothing is pulled from the gateway
//! after the terminal frame, and dropping the relayed stream (client gone)
//! drops the gateway stream with it.

use std::borrow::Cow;

use axum::response::sse::Event;
use compass_gateway::FragmentStream;
use futures::{Stream, StreamExt};
use tracing::warn;

pub const DONE_SENTINEL: &str = "[DONE]";
pub const ERROR_PREFIX: &str = "[ERROR]";

/// One frame of a relayed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Fragment(String),
    Done,
    Error(String),
}

impl Frame {
    /// Text carried in the event's `data` field.
    pub fn payload(&self) -> Cow<'_, str> {
        match self {
            Frame::Fragment(text) => Cow::Borrowed(text),
            Frame::Done => Cow::Borrowed(DONE_SENTINEL),
            Frame::Error(message) => Cow::Owned(format!("{ERROR_PREFIX} {message}")),
        }
    }

    pub fn into_event(self) -> Event {
        // SSE cannot carry a bare CR; newlines are split into data lines by axum.
        let payload = self.payload().replace("\r\n", "\n").replace('\r', "\n");
        Event::default().data(payload)
    }
}

/// Relay `fragments` as frames, ending with a single terminal frame.
pub fn frames(fragments: FragmentStream) -> impl Stream<Item = Frame> + Send {
    futures::stream::unfold(Some(fragments), |state| async move {
        let mut fragments = state?;
        loop {
            match fragments.next().await {
                Some(Ok(text)) if text.is_empty() => continue,
                Some(Ok(text)) => return Some((Frame::Fragment(text), Some(fragments))),
                Some(Err(e)) => {
                    warn!(error = %e, "model stream failed mid-reply");
                    return Some((Frame::Error(e.to_string()), None));
                }
                None => return Some((Frame::Done, None)),
            }
        }
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use compass_gateway::GatewayError;
    use futures::stream;

    fn source(items: Vec<Result<&'static str, &'static str>>) -> FragmentStream {
        stream::iter(items.into_iter().map(|item| {
            item.map(str::to_owned).map_err(|m| GatewayError::Api {
                status: 503,
                message: m.to_owned(),
            })
        }))
        .boxed()
    }

    #[tokio::test]
    async fn fragments_then_done() {
        let out: Vec<Frame> = frames(source(vec![Ok("Hello"), Ok(" there!")])).collect().await;
        assert_eq!(
            out,
            vec![
                Frame::Fragment("Hello".into()),
                Frame::Fragment(" there!".into()),
                Frame::Done
            ]
        );
    }

    #[tokio::test]
    async fn error_is_single_terminal_frame() {
        let out: Vec<Frame> = frames(source(vec![
            Ok("partial"),
            Err("overloaded"),
            Ok("never relayed"),
        ]))
        .collect()
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Frame::Fragment("partial".into()));
        assert_eq!(
            out[1].payload(),
            "[ERROR] model API returned 503: overloaded"
        );
        assert!(!out.contains(&Frame::Done));
        assert_eq!(
            out.iter()
                .filter(|f| !matches!(f, Frame::Fragment(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn empty_source_is_just_done() {
        let out: Vec<Frame> = frames(source(vec![])).collect().await;
        assert_eq!(out, vec![Frame::Done]);
    }

    #[tokio::test]
    async fn empty_fragments_are_not_relayed() {
        let out: Vec<Frame> = frames(source(vec![Ok(""), Ok("a"), Ok("")])).collect().await;
        assert_eq!(out, vec![Frame::Fragment("a".into()), Frame::Done]);
    }
}
