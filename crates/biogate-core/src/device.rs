//! Platform collaborator interfaces
//!
//! A session never touches the biometric provider, the UI or the vibrator
//! directly. Adapters implement these traits for a concrete platform:
//! - [`DeviceContext`] answers capability queries and hands out attempts
//! - [`AttemptHandle`] starts one hardware attempt and returns its outcome stream
//! - [`PresentationSink`] shows prompt text and closes the prompt
//! - [`FeedbackSink`] triggers haptic feedback

use futures::stream::BoxStream;
use std::time::Duration;

use crate::error::Result;
use crate::outcome::AttemptOutcome;
use crate::token::CancellationObserver;

/// Ordered, asynchronous events for a single attempt
pub type OutcomeStream = BoxStream<'static, AttemptOutcome>;

/// Opaque handle to the device's biometric subsystem
///
/// Every query is answered fresh; implementations must not cache results
/// across calls.
pub trait DeviceContext: Send + Sync {
    /// A secure lock screen (PIN, pattern or password) is configured
    fn is_keyguard_secure(&self) -> bool;

    /// The caller holds runtime permission to use the biometric sensor
    fn has_biometric_permission(&self) -> bool;

    /// The platform exposes a biometric service at all
    ///
    /// Older platforms may lack the service entirely; this is the probe for it.
    fn biometric_service_available(&self) -> bool;

    /// Sensor hardware is detected (only meaningful with permission held)
    fn is_hardware_detected(&self) -> bool;

    /// At least one biometric template is enrolled (only meaningful with permission held)
    fn has_enrolled_biometrics(&self) -> bool;

    /// Obtain a handle capable of starting one attempt
    fn attempt_handle(&self) -> Result<Box<dyn AttemptHandle>>;
}

/// Starts a hardware authentication attempt
pub trait AttemptHandle: Send {
    /// Begin listening on the sensor
    ///
    /// The returned stream must stop yielding events once `cancel` is
    /// signaled. Outcome events are yielded in emission order.
    fn start(self: Box<Self>, cancel: CancellationObserver) -> Result<OutcomeStream>;
}

/// UI layer showing the prompt
pub trait PresentationSink: Send + Sync {
    /// Replace the prompt's message line
    fn set_message(&self, text: &str);

    /// Close the prompt
    fn close(&self);
}

/// Haptic feedback, best effort
pub trait FeedbackSink: Send + Sync {
    /// Vibrate for the given duration
    fn vibrate(&self, duration: Duration) -> Result<()>;
}

/// Feedback sink that does nothing, for devices without a vibrator
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFeedback;

impl FeedbackSink for NoFeedback {
    fn vibrate(&self, _duration: Duration) -> Result<()> {
        Ok(())
    }
}
