//! Error types for knovera-chat

use thiserror::Error;

/// Result type alias using knovera-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during chat operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the generation client
    #[error(transparent)]
    Ai(#[from] knovera_ai::Error),

    /// A reply is still streaming
    #[error("A reply is already being generated")]
    Busy,

    /// Nothing to send
    #[error("Prompt is empty")]
    EmptyPrompt,

    /// The operation needs an open conversation
    #[error("No conversation is open")]
    NoConversation,
}

impl Error {
    /// Partial assistant output preserved by a failed stream
    pub fn partial_content(&self) -> Option<&str> {
        match self {
            Error::Ai(e) => e.partial_content(),
            _ => None,
        }
    }
}
