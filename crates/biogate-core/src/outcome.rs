//! Events emitted on a biometric attempt's outcome stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload handed to the caller when an attempt succeeds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    /// Crypto payload unlocked by the provider, if the attempt was bound to one
    pub sealed_payload: Option<Vec<u8>>,
    /// When the provider reported the match
    pub completed_at: DateTime<Utc>,
}

impl AuthenticationResult {
    /// Result without a crypto payload, stamped now
    pub fn new() -> Self {
        Self {
            sealed_payload: None,
            completed_at: Utc::now(),
        }
    }

    /// Result carrying the payload unlocked by the match
    pub fn with_payload(payload: Vec<u8>) -> Self {
        Self {
            sealed_payload: Some(payload),
            completed_at: Utc::now(),
        }
    }
}

impl Default for AuthenticationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Hard error codes reported by platform biometric providers
///
/// The numeric values follow the codes common fingerprint providers use so
/// adapters can map raw integers with [`ErrorCode::from_raw`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Sensor is not available right now
    HardwareUnavailable,
    /// Sensor could not process the current image
    UnableToProcess,
    /// The attempt ran too long
    Timeout,
    /// Not enough storage to complete the operation
    NoSpace,
    /// The system cancelled the attempt
    Canceled,
    /// Too many failed attempts, temporary lockout
    Lockout,
    /// Vendor specific error
    Vendor,
    /// Too many lockouts, the sensor is disabled until a strong credential is used
    LockoutPermanent,
    /// Any other code
    Other(u32),
}

impl ErrorCode {
    /// Map a raw provider code
    pub fn from_raw(code: u32) -> Self {
        match code {
            1 => ErrorCode::HardwareUnavailable,
            2 => ErrorCode::UnableToProcess,
            3 => ErrorCode::Timeout,
            4 => ErrorCode::NoSpace,
            5 => ErrorCode::Canceled,
            7 => ErrorCode::Lockout,
            8 => ErrorCode::Vendor,
            9 => ErrorCode::LockoutPermanent,
            other => ErrorCode::Other(other),
        }
    }

    /// Raw provider code
    pub fn as_raw(&self) -> u32 {
        match self {
            ErrorCode::HardwareUnavailable => 1,
            ErrorCode::UnableToProcess => 2,
            ErrorCode::Timeout => 3,
            ErrorCode::NoSpace => 4,
            ErrorCode::Canceled => 5,
            ErrorCode::Lockout => 7,
            ErrorCode::Vendor => 8,
            ErrorCode::LockoutPermanent => 9,
            ErrorCode::Other(code) => *code,
        }
    }

    /// Whether the sensor refused further attempts
    pub fn is_lockout(&self) -> bool {
        matches!(self, ErrorCode::Lockout | ErrorCode::LockoutPermanent)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Other(code) => write!(f, "code {}", code),
            known => write!(f, "{:?} (code {})", known, known.as_raw()),
        }
    }
}

/// One event on an attempt's outcome stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The biometric matched
    Succeeded(AuthenticationResult),
    /// Recoverable problem, e.g. the finger moved too fast
    Help {
        /// Provider specific help code
        code: u32,
        /// Text to show the user
        message: String,
    },
    /// A biometric was read but did not match
    FailedMatch,
    /// Non-recoverable error; the provider will not report anything else
    Error {
        /// What went wrong
        code: ErrorCode,
        /// Text to show the user
        message: String,
    },
}

impl AttemptOutcome {
    /// Help event
    pub fn help(code: u32, message: impl Into<String>) -> Self {
        AttemptOutcome::Help {
            code,
            message: message.into(),
        }
    }

    /// Hard error event
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        AttemptOutcome::Error {
            code,
            message: message.into(),
        }
    }

    /// Whether the sensor keeps listening after this event
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AttemptOutcome::Help { .. } | AttemptOutcome::FailedMatch)
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptOutcome::Succeeded(_) => "succeeded",
            AttemptOutcome::Help { .. } => "help",
            AttemptOutcome::FailedMatch => "failed-match",
            AttemptOutcome::Error { .. } => "error",
        }
    }
}
