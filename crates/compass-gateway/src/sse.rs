//! Incremental decoder for `text/event-stream` bodies.
//!
//! Network chunks do not line up with event boundaries: a single chunk may
//! carry several events, half an event, or split a multi-byte UTF-8 sequence.
//! [`SseDecoder`] buffers raw bytes and only hands out complete events.

/// Buffers raw body bytes and yields the `data` payload of each complete event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next body chunk and return the payloads of every event it
    /// completes, in order.
    ///
    /// Events without any `data:` line (comments, keep-alives) are skipped.
    /// Multiple `data:` lines within one event are joined with `\n`.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        // CR only ever appears as part of a line terminator.
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(end) = find_event_end(&self.buf) {
            let block: Vec<u8> = self.buf.drain(..end + 2).collect();
            if let Some(data) = event_data(&block[..end]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        event_data(&rest)
    }
}

fn find_event_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn event_data(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let mut data: Option<String> = None;
    for line in text.lines() {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(d) => {
                d.push('\n');
                d.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }
    data
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_chunk_with_two_events() {
        let mut d = SseDecoder::new();
        let out = d.feed(b"data: {\"a\":1}\n\ndata: {\"a\":2}\n\n");
        assert_eq!(out, vec!["{\"a\":1}", "{\"a\":2}"]);
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn event_split_across_chunks() {
        let mut d = SseDecoder::new();
        assert!(d.feed(b"data: hel").is_empty());
        assert!(d.feed(b"lo\n").is_empty());
        assert_eq!(d.feed(b"\n"), vec!["hello"]);
    }

    #[test]
    fn crlf_terminators_are_accepted() {
        let mut d = SseDecoder::new();
        let out = d.feed(b"data: one\r\n\r\ndata: two\r\n\r\n");
        assert_eq!(out, vec!["one", "two"]);
    }

    #[test]
    fn utf8_sequence_split_across_chunks() {
        let bytes = "data: café\n\n".as_bytes();
        // Split inside the two-byte 'é'.
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut d = SseDecoder::new();
        assert!(d.feed(&bytes[..split]).is_empty());
        assert_eq!(d.feed(&bytes[split..]), vec!["café"]);
    }

    #[test]
    fn comments_are_skipped_and_multiline_data_joined() {
        let mut d = SseDecoder::new();
        let out = d.feed(b": keep-alive\n\nevent: message\ndata: a\ndata: b\n\n");
        assert_eq!(out, vec!["a\nb"]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut d = SseDecoder::new();
        assert!(d.feed(b"data: tail").is_empty());
        assert_eq!(d.finish().as_deref(), Some("tail"));
        assert_eq!(d.finish(), None);
    }
}
