//! Public handle for one biometric authentication session

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use biogate_core::{AuthenticationResult, DeviceContext, ErrorCode, FeedbackSink, PresentationSink};

use crate::config::SessionConfig;
use crate::driver::SessionDriver;
use crate::error::{Result, SessionError};
use crate::machine::{Effect, SessionEvent, SessionMachine, SessionOutcome, SessionState};

type SuccessCallback = Box<dyn FnOnce(AuthenticationResult) + Send>;
type FallbackCallback = Box<dyn FnOnce() + Send>;
type ErrorCallback = Box<dyn FnMut(Option<ErrorCode>, &str) + Send>;

/// Callbacks invoked by a running session
///
/// `on_success` and `on_fallback` run at most once. `on_error` sees every
/// hard error (with its provider code, if any) before the session maps it
/// to [`SessionOutcome::Failed`].
#[derive(Default)]
pub struct SessionCallbacks {
    pub(crate) on_success: Option<SuccessCallback>,
    pub(crate) on_fallback: Option<FallbackCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl SessionCallbacks {
    /// Callbacks for the two caller-visible results
    pub fn new(
        on_success: impl FnOnce(AuthenticationResult) + Send + 'static,
        on_fallback: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            on_success: Some(Box::new(on_success)),
            on_fallback: Some(Box::new(on_fallback)),
            on_error: None,
        }
    }

    pub fn on_success(mut self, f: impl FnOnce(AuthenticationResult) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_fallback(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_fallback = Some(Box::new(f));
        self
    }

    /// Inspect hard errors, e.g. to route lockouts differently
    pub fn on_error(mut self, f: impl FnMut(Option<ErrorCode>, &str) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_fallback", &self.on_fallback.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Everything the driver needs that exists before `start`
struct Idle {
    machine: SessionMachine,
    presentation: Arc<dyn PresentationSink>,
    feedback: Arc<dyn FeedbackSink>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
}

impl Idle {
    /// Run an event through the machine without a driver (pre-start dismiss/fallback)
    fn handle_locally(&mut self, event: SessionEvent) {
        for effect in self.machine.handle(event) {
            match effect {
                Effect::Close => self.presentation.close(),
                other => debug!(effect = ?other, "Session not started, skipping effect"),
            }
        }
        self.state_tx.send_replace(self.machine.state());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One biometric authentication, from capability gate to close
///
/// `start` returns immediately; progress is driven by a task on the
/// current tokio runtime. Observe it with [`state`](Self::state),
/// [`subscribe`](Self::subscribe) or [`terminated`](Self::terminated).
/// Dropping the handle dismisses the session.
///
/// The sensor is a singleton: callers must never run two sessions in
/// `Attempting` against the same device at the same time. The session does
/// not enforce this.
pub struct AuthenticationSession {
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    state_rx: watch::Receiver<SessionState>,
    idle: Mutex<Option<Idle>>,
}

impl AuthenticationSession {
    /// Create a session in `Initializing`
    pub fn new(
        config: SessionConfig,
        presentation: Arc<dyn PresentationSink>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Initializing);

        Self {
            events_tx,
            state_rx,
            idle: Mutex::new(Some(Idle {
                machine: SessionMachine::new(config),
                presentation,
                feedback,
                events_rx,
                state_tx,
            })),
        }
    }

    /// Begin authenticating against `device`
    ///
    /// Must be called from within a tokio runtime. A session can be started
    /// once; authentication failures are reported through the callbacks and
    /// the terminal state, never as an error here.
    pub fn start(&self, device: Arc<dyn DeviceContext>, callbacks: SessionCallbacks) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let mut idle = lock(&self.idle);
        let Some(parts) = idle.take() else {
            let err = if self.state().is_terminal() {
                SessionError::Terminated
            } else {
                SessionError::AlreadyStarted
            };
            warn!("Rejected session start: {}", err);
            return Err(err);
        };

        let driver = SessionDriver {
            machine: parts.machine,
            device,
            presentation: parts.presentation,
            feedback: parts.feedback,
            callbacks,
            events_tx: self.events_tx.clone(),
            events_rx: parts.events_rx,
            state_tx: parts.state_tx,
            token: None,
            timer: None,
            forwarder: None,
        };

        // Queued while the lock is held so a concurrent dismiss lands after Start
        let _ = self.events_tx.send(SessionEvent::Start);
        runtime.spawn(driver.run());
        info!("Authentication session started");

        Ok(())
    }

    /// Close the session as cancelled by the user; idempotent
    pub fn dismiss(&self) {
        self.send(SessionEvent::Dismiss);
    }

    /// The user chose the non-biometric path (e.g. "use password")
    pub fn on_fallback_requested(&self) {
        self.send(SessionEvent::FallbackRequested);
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Wait for the session to finish
    ///
    /// Returns `None` if the driver stopped without reaching a terminal
    /// state, e.g. because the runtime shut down.
    pub async fn terminated(&self) -> Option<SessionOutcome> {
        let mut state_rx = self.state_rx.clone();
        if let Ok(state) = state_rx.wait_for(SessionState::is_terminal).await {
            return state.outcome();
        }
        let outcome = state_rx.borrow().outcome();
        outcome
    }

    fn send(&self, event: SessionEvent) {
        let mut idle = lock(&self.idle);
        if let Some(parts) = idle.as_mut() {
            parts.handle_locally(event);
            if parts.machine.state().is_terminal() {
                *idle = None;
            }
            return;
        }
        drop(idle);

        // The driver is gone once terminated; further requests are no-ops
        if self.events_tx.send(event).is_err() {
            debug!("Session already finished");
        }
    }
}

impl Drop for AuthenticationSession {
    fn drop(&mut self) {
        self.send(SessionEvent::Dismiss);
    }
}

impl fmt::Debug for AuthenticationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationSession")
            .field("state", &self.state())
            .finish()
    }
}
