//! Error types for parley-wire

use thiserror::Error;

/// Result type alias using parley-wire Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the streaming chat endpoint
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Endpoint responded with a non-success status
    #[error("server returned status {code}: {message}")]
    Status { code: u16, message: String },

    /// Endpoint reported a failure through an error event
    #[error("server error: {message}")]
    Server { message: String },

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Request was aborted by the caller
    #[error("request aborted")]
    Aborted,

    /// Unexpected response shape
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create a server error from a reported message
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Check if this error came from the caller cancelling the request
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}
