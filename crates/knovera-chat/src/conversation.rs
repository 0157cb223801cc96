//! Chat state: transcript, streaming status, and the open conversation.

use knovera_ai::{
    ConversationStats, Message,
    vector::{VectorComparison, visualization_scale},
};

/// Chat state: transcript, streaming status, and the open conversation.
#[derive(Debug, Default)]
pub struct ChatState {
    /// Open conversation; `None` until the backend assigns one
    pub conversation_id: Option<String>,
    /// Transcript, oldest first
    pub messages: Vec<Message>,
    /// Whether a reply is streaming
    pub is_streaming: bool,
    /// Last error
    pub error: Option<String>,
    /// Stats of the open conversation
    pub stats: Option<ConversationStats>,
}

/// An embedding ready to be drawn, with its nearest predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingView {
    /// Index of the message in the transcript
    pub index: usize,
    pub values: Vec<f64>,
    /// Index and embedding of the nearest earlier message that has one
    pub previous: Option<(usize, Vec<f64>)>,
    pub comparison: Option<VectorComparison>,
    /// Factor that maps both vectors into [-1, 1]
    pub scale: f64,
}

impl ChatState {
    /// Forget the open conversation and its transcript.
    pub fn reset(&mut self) {
        *self = ChatState::default();
    }

    /// Indices of messages that carry a usable embedding
    pub fn embedded_indices(&self) -> Vec<usize> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.embedding_vector().is_some_and(|v| !v.is_empty()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Embedding of the message at `index`, compared with the nearest
    /// earlier message that also has one.
    pub fn embedding_view(&self, index: usize) -> Option<EmbeddingView> {
        let values = self
            .messages
            .get(index)?
            .embedding_vector()
            .filter(|v| !v.is_empty())?;

        let previous = self.messages[..index]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, m)| {
                m.embedding_vector()
                    .filter(|v| !v.is_empty())
                    .map(|v| (i, v))
            });

        let comparison = previous
            .as_ref()
            .map(|(_, prev)| VectorComparison::compute(&values, prev));
        let scale = visualization_scale(
            &values,
            previous.as_ref().map(|(_, v)| v.as_slice()).unwrap_or(&[]),
        );

        Some(EmbeddingView {
            index,
            values,
            previous,
            comparison,
            scale,
        })
    }
}
