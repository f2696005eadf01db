//! In-memory collaborators for tests and demos
//!
//! [`MockDevice`] answers capability queries from configurable flags and
//! lets the test emit outcome events into the running attempt by hand.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::device::{AttemptHandle, DeviceContext, FeedbackSink, OutcomeStream, PresentationSink};
use crate::error::{CoreError, Result};
use crate::outcome::AttemptOutcome;
use crate::token::CancellationObserver;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Raw answers the mock device gives to capability queries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockCapabilities {
    pub keyguard_secure: bool,
    pub permission: bool,
    pub service_available: bool,
    pub hardware_detected: bool,
    pub enrolled: bool,
}

impl MockCapabilities {
    /// Everything configured
    pub fn ready() -> Self {
        Self {
            keyguard_secure: true,
            permission: true,
            service_available: true,
            hardware_detected: true,
            enrolled: true,
        }
    }

    /// Ready device with no enrolled biometric
    pub fn without_enrollment() -> Self {
        Self {
            enrolled: false,
            ..Self::ready()
        }
    }

    /// Ready device where the permission was revoked
    pub fn without_permission() -> Self {
        Self {
            permission: false,
            ..Self::ready()
        }
    }
}

impl Default for MockCapabilities {
    fn default() -> Self {
        Self::ready()
    }
}

#[derive(Default)]
struct AttemptState {
    started: usize,
    sender: Option<mpsc::UnboundedSender<AttemptOutcome>>,
    observer: Option<CancellationObserver>,
    start_failure: Option<String>,
}

/// Scriptable biometric device
pub struct MockDevice {
    capabilities: Mutex<MockCapabilities>,
    attempt: Arc<Mutex<AttemptState>>,
}

impl MockDevice {
    /// Device answering with the given capabilities
    pub fn new(capabilities: MockCapabilities) -> Self {
        Self {
            capabilities: Mutex::new(capabilities),
            attempt: Arc::new(Mutex::new(AttemptState::default())),
        }
    }

    /// Fully configured device
    pub fn ready() -> Self {
        Self::new(MockCapabilities::ready())
    }

    /// Change the answers for subsequent queries
    pub fn set_capabilities(&self, capabilities: MockCapabilities) {
        *lock(&self.capabilities) = capabilities;
    }

    /// Make the next attempt fail to start with the given reason
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        lock(&self.attempt).start_failure = Some(reason.into());
    }

    /// Number of attempts started on this device
    pub fn attempts_started(&self) -> usize {
        lock(&self.attempt).started
    }

    /// Observer of the most recent attempt's token
    pub fn last_token(&self) -> Option<CancellationObserver> {
        lock(&self.attempt).observer.clone()
    }

    /// Emit an outcome on the running attempt
    ///
    /// Returns `false` when no attempt is running or its token was signaled.
    pub fn emit(&self, outcome: AttemptOutcome) -> bool {
        let state = lock(&self.attempt);
        let signaled = state
            .observer
            .as_ref()
            .map(CancellationObserver::is_signaled)
            .unwrap_or(true);
        if signaled {
            debug!(kind = outcome.kind(), "Mock attempt not listening, dropping outcome");
            return false;
        }
        match &state.sender {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }
}

impl DeviceContext for MockDevice {
    fn is_keyguard_secure(&self) -> bool {
        lock(&self.capabilities).keyguard_secure
    }

    fn has_biometric_permission(&self) -> bool {
        lock(&self.capabilities).permission
    }

    fn biometric_service_available(&self) -> bool {
        lock(&self.capabilities).service_available
    }

    fn is_hardware_detected(&self) -> bool {
        lock(&self.capabilities).hardware_detected
    }

    fn has_enrolled_biometrics(&self) -> bool {
        lock(&self.capabilities).enrolled
    }

    fn attempt_handle(&self) -> Result<Box<dyn AttemptHandle>> {
        Ok(Box::new(MockAttempt {
            state: Arc::clone(&self.attempt),
        }))
    }
}

struct MockAttempt {
    state: Arc<Mutex<AttemptState>>,
}

impl AttemptHandle for MockAttempt {
    fn start(self: Box<Self>, cancel: CancellationObserver) -> Result<OutcomeStream> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.start_failure.take() {
            return Err(CoreError::AttemptUnavailable(reason));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.started += 1;
        state.sender = Some(tx);
        state.observer = Some(cancel);

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

/// Presentation sink that records every call
#[derive(Default)]
pub struct RecordingPresentation {
    messages: Mutex<Vec<String>>,
    closes: Mutex<usize>,
}

impl RecordingPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message shown, oldest first
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    /// Message currently shown
    pub fn last_message(&self) -> Option<String> {
        lock(&self.messages).last().cloned()
    }

    /// How many times the prompt was closed
    pub fn close_count(&self) -> usize {
        *lock(&self.closes)
    }
}

impl PresentationSink for RecordingPresentation {
    fn set_message(&self, text: &str) {
        lock(&self.messages).push(text.to_string());
    }

    fn close(&self) {
        *lock(&self.closes) += 1;
    }
}

/// Feedback sink that records vibrations, optionally failing each one
#[derive(Default)]
pub struct RecordingFeedback {
    vibrations: Mutex<Vec<Duration>>,
    failing: bool,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose every vibration fails
    pub fn failing() -> Self {
        Self {
            vibrations: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    /// Requested vibrations, oldest first
    pub fn vibrations(&self) -> Vec<Duration> {
        lock(&self.vibrations).clone()
    }
}

impl FeedbackSink for RecordingFeedback {
    fn vibrate(&self, duration: Duration) -> Result<()> {
        lock(&self.vibrations).push(duration);
        if self.failing {
            return Err(CoreError::Feedback("vibrator unavailable".to_string()));
        }
        Ok(())
    }
}
