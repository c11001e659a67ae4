//! Error types and handling for pipe streams
//!
//! Failures travel as `Err` items on the stream that produced them. A stream
//! yields nothing further after its first error.

/// Main error type for pipe stream operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// A pipeline's source was pulled after it had been moved away
    #[error("use after move")]
    UseAfterMove,
    /// A user callback failed
    #[error("callback failed: {0}")]
    Callback(String),
    /// A source reported a failure while producing its next item
    #[error("source failed: {0}")]
    Source(String),
    /// Custom error with message
    #[error("stream error: {0}")]
    Custom(String),
}

impl StreamError {
    /// Build a [`StreamError::Callback`] from anything printable.
    pub fn callback(msg: impl ToString) -> Self {
        StreamError::Callback(msg.to_string())
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Source(err.to_string())
    }
}

/// Result type for pipe stream operations
pub type StreamResult<T> = Result<T, StreamError>;
