//! Error types for parley-client

use thiserror::Error;

/// Result type alias using parley-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a turn
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire/protocol layer
    #[error(transparent)]
    Wire(#[from] parley_wire::Error),

    /// A generic client error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if this error came from the caller cancelling the request
    pub fn is_cancellation(&self) -> bool {
        match self {
            Error::Wire(e) => e.is_cancellation(),
            Error::Other(_) => false,
        }
    }
}
