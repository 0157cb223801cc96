//! Incremental decoding of the generation event stream
//!
//! The response body arrives as arbitrary byte fragments. [`LineDecoder`]
//! turns them into complete text lines, [`classify_line`] picks out the
//! `data: ` payloads, and [`dispatch`] parses each payload into a
//! [`StreamEvent`]. [`decode_events`] wires the three together over an async
//! byte stream.

use std::collections::HashMap;
use std::fmt::Display;

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::types::Embedding;

/// Prefix marking a data-bearing line
pub const DATA_PREFIX: &str = "data: ";

/// Conventional end-of-stream payload, skipped without dispatch
pub const DONE_SENTINEL: &str = "[DONE]";

/// Events emitted by the generation endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Stream opened; carries whatever metadata the server attached
    Start {
        #[serde(flatten)]
        meta: HashMap<String, serde_json::Value>,
    },
    /// One increment of generated text
    Chunk {
        #[serde(default)]
        content: Option<String>,
    },
    /// Generation finished
    Done(DoneEvent),
    /// Generation failed server-side
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// Any `type` this client does not know about
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_) | StreamEvent::Error { .. })
    }
}

/// Payload of the terminal `done` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoneEvent {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub embedding: Option<Embedding>,
    #[serde(default)]
    pub formatted: Option<serde_json::Value>,
    /// Some backends nest the result one level down
    #[serde(default)]
    pub data: Option<DoneData>,
}

/// Nested result shape accepted inside a `done` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoneData {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub embedding: Option<Embedding>,
}

impl DoneEvent {
    /// Server-reported conversation id, ignoring empty strings
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id
            .as_deref()
            .or_else(|| self.data.as_ref()?.conversation_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Server-reported embedding, if any
    pub fn embedding(&self) -> Option<&Embedding> {
        self.embedding
            .as_ref()
            .or_else(|| self.data.as_ref()?.embedding.as_ref())
    }
}

/// Classification of one decoded line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A `data: ` line with a payload worth parsing
    Payload(&'a str),
    /// The `[DONE]` sentinel
    Sentinel,
    /// A `data: ` line with nothing after the prefix
    Empty,
    /// Comments, heartbeats, `event:` lines and anything else
    Ignored,
}

/// Classify a single line. The prefix match is case-sensitive.
pub fn classify_line(line: &str) -> Frame<'_> {
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return Frame::Ignored;
    };
    let payload = rest.trim();
    if payload.is_empty() {
        Frame::Empty
    } else if payload == DONE_SENTINEL {
        Frame::Sentinel
    } else {
        Frame::Payload(payload)
    }
}

/// Result of handing one payload to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// A well-formed event
    Event(StreamEvent),
    /// The payload was not valid JSON for an event; the stream carries on
    Malformed { payload: String, error: String },
}

/// Parse a payload into an event. Never fails: bad payloads come back as
/// [`StreamItem::Malformed`].
pub fn dispatch(payload: &str) -> StreamItem {
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => StreamItem::Event(event),
        Err(e) => {
            tracing::warn!("Failed to parse stream line: {} ({})", payload, e);
            StreamItem::Malformed {
                payload: payload.to_string(),
                error: e.to_string(),
            }
        }
    }
}

/// Stateful byte-to-line decoder.
///
/// Keeps a carry-over of the last unterminated line and any UTF-8 sequence
/// split across fragment boundaries.
#[derive(Debug, Default)]
pub struct LineDecoder {
    carry: String,
    pending: Vec<u8>,
}

impl LineDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment and return every line it completed, in order.
    /// Line terminators (`\n`, optionally preceded by `\r`) are stripped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let text = self.decode_utf8(bytes);
        self.carry.push_str(&text);

        let Some(last_newline) = self.carry.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.carry.split_off(last_newline + 1);
        let mut complete = std::mem::replace(&mut self.carry, rest);
        complete.pop();

        complete
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// End of input. Returns the unterminated trailing text, if any; callers
    /// discard it rather than treating it as a line.
    pub fn finish(mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.carry.push_str(&tail);
        }
        if self.carry.is_empty() {
            None
        } else {
            Some(self.carry)
        }
    }

    fn decode_utf8(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut pos = 0;
        while pos < input.len() {
            match std::str::from_utf8(&input[pos..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    pos = input.len();
                }
                Err(e) => {
                    let valid_end = pos + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&input[pos..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            pos = valid_end + len;
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            self.pending = input[valid_end..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}

/// A stream of decoded items
pub type StreamItems = std::pin::Pin<Box<dyn Stream<Item = StreamItem> + Send>>;

/// Decode an async byte stream into stream items.
///
/// Each fragment is fully split and every completed line yielded before the
/// next fragment is read. A read error or cancellation ends the stream
/// the same way a clean end-of-body does; an unterminated final line is
/// dropped.
pub fn decode_events<S, B, E>(body: S, cancel: CancellationToken) -> StreamItems
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(stream! {
        let mut body = Box::pin(body);
        let mut decoder = LineDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Stream cancelled, stopping reads");
                    break;
                }
                next = body.next() => next,
            };

            let fragment = match next {
                None => break,
                Some(Err(e)) => {
                    tracing::warn!("Stream read ended early: {}", e);
                    break;
                }
                Some(Ok(fragment)) => fragment,
            };

            for line in decoder.push(fragment.as_ref()) {
                if let Frame::Payload(payload) = classify_line(&line) {
                    yield dispatch(payload);
                }
            }
        }

        if let Some(rest) = decoder.finish() {
            tracing::debug!("Discarding unterminated trailing line ({} bytes)", rest.len());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(parts: &[&[u8]]) -> Vec<std::result::Result<Vec<u8>, std::io::Error>> {
        parts.iter().map(|p| Ok(p.to_vec())).collect()
    }

    async fn collect(parts: &[&[u8]]) -> Vec<StreamItem> {
        let body = futures::stream::iter(fragments(parts));
        decode_events(body, CancellationToken::new())
            .collect()
            .await
    }

    fn chunk(text: &str) -> StreamItem {
        StreamItem::Event(StreamEvent::Chunk {
            content: Some(text.to_string()),
        })
    }

    #[test]
    fn test_lines_split_across_fragments() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert_eq!(decoder.push(b":1}\ndata: x\n"), vec!["data: {\"a\":1}", "data: x"]);
        assert_eq!(decoder.push(b"tail"), Vec::<String>::new());
        assert_eq!(decoder.finish(), Some("tail".to_string()));
    }

    #[test]
    fn test_n_lines_then_partial_yields_exactly_n() {
        let input = b"one\ntwo\nthree\npartial";
        for split in 1..input.len() {
            let mut decoder = LineDecoder::new();
            let mut lines = decoder.push(&input[..split]);
            lines.extend(decoder.push(&input[split..]));
            assert_eq!(lines, vec!["one", "two", "three"], "split at {}", split);
            assert_eq!(decoder.finish().as_deref(), Some("partial"));
        }
    }

    #[test]
    fn test_crlf_and_empty_lines() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"a\r\n\r\nb\n"), vec!["a", "", "b"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_multibyte_split_across_fragments() {
        let text = "data: héllo 世界\n".as_bytes();
        // Split inside the three-byte '世'
        let cut = text.iter().position(|&b| b == 0xE4).unwrap() + 1;
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&text[..cut]).is_empty());
        assert_eq!(decoder.push(&text[cut..]), vec!["data: héllo 世界"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"a\xFFb\n"), vec!["a\u{FFFD}b"]);
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("data: {\"x\":1}"), Frame::Payload("{\"x\":1}"));
        assert_eq!(classify_line("data: [DONE]"), Frame::Sentinel);
        assert_eq!(classify_line("data: "), Frame::Empty);
        assert_eq!(classify_line("data:{}"), Frame::Ignored);
        assert_eq!(classify_line("Data: {}"), Frame::Ignored);
        assert_eq!(classify_line(": heartbeat"), Frame::Ignored);
        assert_eq!(classify_line("event: message"), Frame::Ignored);
    }

    #[test]
    fn test_dispatch_kinds() {
        assert_eq!(dispatch(r#"{"type":"chunk","content":"hi"}"#), chunk("hi"));

        match dispatch(r#"{"type":"start","model":"qwen","conversationId":"c1"}"#) {
            StreamItem::Event(StreamEvent::Start { meta }) => {
                assert_eq!(meta["model"], "qwen");
            }
            other => panic!("unexpected: {:?}", other),
        }

        match dispatch(r#"{"type":"done","conversationId":"abc","embedding":[0.1,0.2]}"#) {
            StreamItem::Event(StreamEvent::Done(done)) => {
                assert_eq!(done.conversation_id(), Some("abc"));
                assert_eq!(
                    done.embedding().and_then(Embedding::to_vector),
                    Some(vec![0.1, 0.2])
                );
            }
            other => panic!("unexpected: {:?}", other),
        }

        assert_eq!(
            dispatch(r#"{"type":"error","message":"boom"}"#),
            StreamItem::Event(StreamEvent::Error {
                message: Some("boom".into())
            })
        );
        assert_eq!(
            dispatch(r#"{"type":"sources","items":[]}"#),
            StreamItem::Event(StreamEvent::Unknown)
        );
        assert!(matches!(dispatch("{not json"), StreamItem::Malformed { .. }));
    }

    #[test]
    fn test_done_reads_nested_data() {
        let done: DoneEvent = serde_json::from_str(
            r#"{"conversationId":"","data":{"conversationId":"nested","embedding":[1]}}"#,
        )
        .unwrap();
        assert_eq!(done.conversation_id(), None);

        let done: DoneEvent =
            serde_json::from_str(r#"{"data":{"conversationId":"nested","embedding":[1]}}"#)
                .unwrap();
        assert_eq!(done.conversation_id(), Some("nested"));
        assert!(done.embedding().is_some());
    }

    #[tokio::test]
    async fn test_decode_events_filters_noise() {
        let items = collect(&[
            b": keep-alive\n",
            b"data: {\"type\":\"chunk\",\"con",
            b"tent\":\"Hel\"}\n\ndata: {\"type\":\"chunk\",\"content\":\"lo\"}\n",
            b"data: [DONE]\ndata: \n",
            b"data: {\"type\":\"chunk\",\"content\":\"never\"}",
        ])
        .await;
        assert_eq!(items, vec![chunk("Hel"), chunk("lo")]);
    }

    #[tokio::test]
    async fn test_read_error_ends_stream_cleanly() {
        let parts: Vec<std::result::Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n".to_vec()),
            Err(std::io::Error::other("connection reset")),
            Ok(b"data: {\"type\":\"chunk\",\"content\":\"b\"}\n".to_vec()),
        ];
        let items: Vec<_> = decode_events(futures::stream::iter(parts), CancellationToken::new())
            .collect()
            .await;
        assert_eq!(items, vec![chunk("a")]);
    }

    #[tokio::test]
    async fn test_cancelled_stream_yields_nothing_more() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let items: Vec<_> = decode_events(
            futures::stream::iter(fragments(&[b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n"])),
            cancel,
        )
        .collect()
        .await;
        assert!(items.is_empty());
    }
}
