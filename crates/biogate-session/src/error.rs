//! Error types for Biogate sessions

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors reported by the session API
///
/// Authentication failures are not errors; they end the session with a
/// [`SessionOutcome`](crate::SessionOutcome). These cover misuse and
/// configuration problems only.
#[derive(Debug, Error)]
pub enum SessionError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// `start` was called on a session that is already running
    #[error("Session already started")]
    AlreadyStarted,

    /// `start` was called on a session that was already dismissed
    #[error("Session already terminated")]
    Terminated,

    /// `start` was called outside a tokio runtime
    #[error("No async runtime available to drive the session")]
    NoRuntime,
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}
