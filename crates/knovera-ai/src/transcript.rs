//! Assembling the assistant reply from streamed chunks

use std::collections::HashMap;

use futures::StreamExt;
use tokio_stream::Stream;

use crate::{
    error::{Error, Result},
    stream::{DoneEvent, StreamEvent, StreamItem},
};

/// Accumulates `chunk` text for one in-flight request.
///
/// Never shared between requests: each generation owns its own instance.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    content: String,
    chunks: usize,
}

impl TranscriptAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the full text so far.
    /// Empty chunks are ignored and return `None`.
    pub fn push_chunk(&mut self, delta: &str) -> Option<&str> {
        if delta.is_empty() {
            return None;
        }
        self.content.push_str(delta);
        self.chunks += 1;
        Some(&self.content)
    }

    /// Text accumulated so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of chunks applied
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Consume the accumulator, returning the text
    pub fn into_content(self) -> String {
        self.content
    }
}

/// What a stream left behind once it stopped
#[derive(Debug, Default)]
pub struct Exchange {
    /// Concatenation of every chunk, in arrival order
    pub content: String,
    /// Number of chunks applied
    pub chunks: usize,
    /// Terminal snapshot; `None` when the body ended without a `done` event
    pub done: Option<DoneEvent>,
    /// Metadata from the `start` event, if one arrived
    pub start_meta: Option<HashMap<String, serde_json::Value>>,
    /// Payloads that failed to parse and were skipped
    pub malformed: Vec<String>,
}

/// Drive a stream of items to completion.
///
/// `on_chunk` receives the full accumulated text after every chunk, in order,
/// before the next item is pulled from the stream. Processing stops at the
/// first `done`. An `error` event fails the exchange with
/// [`Error::Stream`], carrying the text accumulated up to that point.
pub async fn accumulate<S, F>(items: S, mut on_chunk: F) -> Result<Exchange>
where
    S: Stream<Item = StreamItem>,
    F: FnMut(&str),
{
    let mut items = std::pin::pin!(items);
    let mut acc = TranscriptAccumulator::new();
    let mut done = None;
    let mut start_meta = None;
    let mut malformed = Vec::new();

    while let Some(item) = items.next().await {
        let event = match item {
            StreamItem::Event(event) => event,
            StreamItem::Malformed { payload, .. } => {
                malformed.push(payload);
                continue;
            }
        };

        match event {
            StreamEvent::Chunk { content } => {
                if let Some(full) = acc.push_chunk(content.as_deref().unwrap_or_default()) {
                    on_chunk(full);
                }
            }
            StreamEvent::Start { meta } => {
                tracing::debug!("Generation started: {:?}", meta);
                start_meta = Some(meta);
            }
            StreamEvent::Done(event) => {
                done = Some(event);
                break;
            }
            StreamEvent::Error { message } => {
                return Err(Error::Stream {
                    message: message.unwrap_or_else(|| "unknown stream error".to_string()),
                    partial: acc.into_content(),
                });
            }
            StreamEvent::Unknown => {
                tracing::trace!("Ignoring unknown stream event");
            }
        }
    }

    let chunks = acc.chunk_count();
    Ok(Exchange {
        content: acc.into_content(),
        chunks,
        done,
        start_meta,
        malformed,
    })
}
