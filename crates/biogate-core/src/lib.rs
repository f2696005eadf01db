//! Biogate Core - capability gating and collaborator interfaces
//!
//! This crate provides the leaf pieces a biometric session is built from:
//! - Capability checks that gate whether an attempt may start
//! - The cancellation token owned by a session for its attempt
//! - Outcome stream events reported by the biometric provider
//! - Traits for the device, presentation and feedback collaborators
//!
//! # Optional Features
//!
//! - `mock` - In-memory device and recording sinks for tests

pub mod capability;
pub mod device;
pub mod error;
pub mod outcome;
pub mod token;

#[cfg(feature = "mock")]
pub mod mock;

pub use capability::{CapabilityChecker, CapabilityResult, Requirement};
pub use device::{
    AttemptHandle, DeviceContext, FeedbackSink, NoFeedback, OutcomeStream, PresentationSink,
};
pub use error::{CoreError, Result};
pub use outcome::{AttemptOutcome, AuthenticationResult, ErrorCode};
pub use token::{CancellationObserver, CancellationToken};
