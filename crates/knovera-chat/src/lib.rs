//! knovera-chat: chat session runtime
//!
//! This crate keeps the visible transcript of a chat, streams replies into an
//! assistant placeholder, and broadcasts what happens to any listener.

pub mod backend;
pub mod chat;
pub mod conversation;
pub mod error;
pub mod events;
pub mod handle;

pub use backend::ChatBackend;
pub use chat::{ChatConfig, ChatSession};
pub use conversation::{ChatState, EmbeddingView};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use handle::ChatHandle;
