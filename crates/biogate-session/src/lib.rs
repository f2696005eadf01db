//! Biogate Session - biometric authentication driven to completion
//!
//! This crate provides the [`AuthenticationSession`]:
//! - Gates the attempt on the capability checks from `biogate-core`
//! - Starts one hardware attempt and owns its cancellation token
//! - Interprets the outcome stream (success, help, failed match, error)
//! - Runs the retry and exit delays, which a dismiss always overrides
//!
//! The transition table lives in [`machine`] as a pure function of events;
//! the async driver executes its effects on a single tokio task.

pub mod config;
mod driver;
pub mod error;
pub mod machine;
pub mod session;

pub use config::{SessionConfig, SessionMessages};
pub use error::{Result, SessionError};
pub use machine::{SessionMachine, SessionOutcome, SessionState};
pub use session::{AuthenticationSession, SessionCallbacks};
