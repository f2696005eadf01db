//! Single-consumer event loop executing the transition table's effects
//!
//! Every producer (public handle, outcome forwarder, timers, the driver
//! itself) sends into one unbounded queue; only this task mutates the
//! machine, so transitions are strictly sequential.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use biogate_core::{
    CancellationObserver, CancellationToken, CapabilityChecker, DeviceContext, FeedbackSink,
    OutcomeStream, PresentationSink,
};

use crate::machine::{Effect, SessionEvent, SessionMachine, SessionState, TimerSlot};
use crate::session::SessionCallbacks;

pub(crate) struct SessionDriver {
    pub(crate) machine: SessionMachine,
    pub(crate) device: Arc<dyn DeviceContext>,
    pub(crate) presentation: Arc<dyn PresentationSink>,
    pub(crate) feedback: Arc<dyn FeedbackSink>,
    pub(crate) callbacks: SessionCallbacks,
    pub(crate) events_tx: mpsc::UnboundedSender<SessionEvent>,
    pub(crate) events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    pub(crate) state_tx: watch::Sender<SessionState>,
    pub(crate) token: Option<CancellationToken>,
    pub(crate) timer: Option<JoinHandle<()>>,
    pub(crate) forwarder: Option<JoinHandle<()>>,
}

impl SessionDriver {
    /// Consume events until the machine terminates
    pub(crate) async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            let before = self.machine.state();
            let effects = self.machine.handle(event);
            for effect in effects {
                self.apply(effect);
            }

            let after = self.machine.state();
            if before != after {
                debug!(from = ?before, to = ?after, "Session transition");
                self.state_tx.send_replace(after);
            }

            if let SessionState::Terminated(outcome) = after {
                info!(?outcome, "Authentication session finished");
                break;
            }
        }

        self.shutdown();
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::EvaluateCapability => {
                let result = CapabilityChecker::evaluate(self.device.as_ref());
                debug!(?result, "Capability gate evaluated");
                self.enqueue(SessionEvent::CapabilityEvaluated(result));
            }
            Effect::StartAttempt => self.start_attempt(),
            Effect::ShowMessage(text) => self.presentation.set_message(&text),
            Effect::Vibrate(duration) => {
                if let Err(e) = self.feedback.vibrate(duration) {
                    debug!("Haptic feedback failed: {}", e);
                }
            }
            Effect::ScheduleTimer {
                slot,
                generation,
                delay,
            } => self.schedule_timer(slot, generation, delay),
            Effect::CancelTimer => self.cancel_timer(),
            Effect::SignalToken => {
                if let Some(token) = &self.token {
                    if token.signal() {
                        debug!("Attempt token signaled");
                    }
                }
            }
            Effect::ReportError { code, message } => {
                warn!(?code, "Biometric attempt failed: {}", message);
                if let Some(on_error) = self.callbacks.on_error.as_mut() {
                    on_error(code, &message);
                }
            }
            Effect::NotifySuccess(result) => {
                if let Some(on_success) = self.callbacks.on_success.take() {
                    on_success(result);
                }
            }
            Effect::NotifyFallback => {
                if let Some(on_fallback) = self.callbacks.on_fallback.take() {
                    on_fallback();
                }
            }
            Effect::Close => self.presentation.close(),
        }
    }

    fn start_attempt(&mut self) {
        if self.token.is_some() {
            warn!("Attempt already started for this session");
            return;
        }

        let token = CancellationToken::new();
        let observer = token.observer();
        self.token = Some(token);

        let stream = match self
            .device
            .attempt_handle()
            .and_then(|handle| handle.start(observer.clone()))
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to start biometric attempt: {}", e);
                self.enqueue(SessionEvent::AttemptUnavailable(e.to_string()));
                return;
            }
        };

        info!("Biometric attempt started");
        let events = self.events_tx.clone();
        self.forwarder = Some(tokio::spawn(forward_outcomes(stream, observer, events)));
    }

    fn schedule_timer(&mut self, slot: TimerSlot, generation: u64, delay: Duration) {
        self.cancel_timer();
        debug!(?slot, generation, ?delay, "Timer scheduled");

        let events = self.events_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::TimerFired { slot, generation });
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn enqueue(&self, event: SessionEvent) {
        // The driver owns the receiver, so this only fails during shutdown
        let _ = self.events_tx.send(event);
    }

    fn shutdown(&mut self) {
        self.cancel_timer();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(token) = self.token.take() {
            token.signal();
        }
    }
}

/// Relay outcome events into the session queue until the token is signaled
async fn forward_outcomes(
    mut stream: OutcomeStream,
    cancel: CancellationObserver,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.signaled() => break,
            next = stream.next() => match next {
                Some(outcome) => {
                    debug!(kind = outcome.kind(), "Attempt outcome");
                    if events.send(SessionEvent::Outcome(outcome)).is_err() {
                        break;
                    }
                }
                None => {
                    debug!("Outcome stream ended");
                    break;
                }
            },
        }
    }
}
