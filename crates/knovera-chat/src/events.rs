//! Chat event types

use knovera_ai::Message;
use serde::Serialize;

/// Events emitted while a chat session runs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A prompt was sent; an empty assistant placeholder was added
    ExchangeStart { placeholder_id: String },

    /// The placeholder's content changed; `content` is the full text so far
    MessageUpdate { id: String, content: String },

    /// The assistant reply is final
    MessageEnd { message: Message },

    /// The backend created a conversation for this exchange
    ConversationCreated { conversation_id: String },

    /// The exchange failed; any partial reply stays in the transcript
    Error { message: String },

    /// The exchange finished, successfully or not
    ExchangeEnd { conversation_id: Option<String> },
}

impl ChatEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::ExchangeEnd { .. })
    }
}
