//! knovera-ai: streaming generation client
//!
//! This crate decodes the token stream of the generation endpoint, rebuilds
//! the assistant reply chunk by chunk, works out which conversation an
//! exchange belongs to, and compares embedding vectors.

pub mod client;
pub mod error;
pub mod identity;
pub mod session;
pub mod stream;
pub mod transcript;
pub mod types;
pub mod vector;

pub use client::ApiClient;
pub use error::{Error, Result};
pub use identity::{ConversationSource, Resolution, resolve_conversation_id};
pub use session::SessionContext;
pub use stream::{StreamEvent, StreamItem};
pub use transcript::{Exchange, TranscriptAccumulator};
pub use types::*;
pub use vector::VectorComparison;
