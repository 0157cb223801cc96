//! Error types for knovera-ai

use thiserror::Error;

/// Result type alias using knovera-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the generation client
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed or the response body could not be opened
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON serialization/deserialization of a whole response failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope came back with `success: false` or without data
    #[error("API error: {message}")]
    Api { message: String },

    /// The server emitted an `error` event mid-stream.
    ///
    /// `partial` holds whatever assistant text had accumulated before it.
    #[error("Stream error: {message}")]
    Stream { message: String, partial: String },

    /// No user id was available for a request that needs one
    #[error("No user id available for this request")]
    MissingUserId,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from a server message
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Whether the failure happened before or while talking to the network,
    /// as opposed to being reported by the server inside a stream.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Status { .. })
    }

    /// Partial assistant output preserved by a stream failure, if any
    pub fn partial_content(&self) -> Option<&str> {
        match self {
            Error::Stream { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
