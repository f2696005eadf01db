//! Error types for Biogate collaborators

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors reported by the platform collaborators a session talks to
#[derive(Debug, Error)]
pub enum CoreError {
    /// The platform could not hand out an attempt handle or start an attempt
    #[error("Biometric attempt unavailable: {0}")]
    AttemptUnavailable(String),

    /// Haptic feedback could not be delivered
    #[error("Feedback error: {0}")]
    Feedback(String),
}
