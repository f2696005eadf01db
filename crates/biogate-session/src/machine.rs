//! Transition table for an authentication session
//!
//! [`SessionMachine`] is a pure function of its events: every call to
//! [`SessionMachine::handle`] moves to the next state and returns the
//! [`Effect`]s the driver must carry out, in order. It performs no IO and
//! owns no timers or tokens, only their bookkeeping:
//!
//! - at most one pending timer, identified by a generation number; a timer
//!   firing with a stale generation is ignored
//! - the attempt token is allocated at most once and signaled at most once
//! - once `Terminated`, every event is ignored

use std::time::Duration;

use biogate_core::{AttemptOutcome, AuthenticationResult, CapabilityResult, ErrorCode};
use tracing::debug;

use crate::config::SessionConfig;

/// How a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionOutcome {
    /// The biometric matched
    Succeeded,
    /// The user dismissed the prompt or chose the fallback path
    UserCancelled,
    /// The provider reported a non-recoverable error
    Failed,
    /// The capability gate did not pass
    Ineligible,
}

/// Live state of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not started
    Initializing,
    /// Running the capability gate
    Checking,
    /// Sensor listening
    Attempting,
    /// Showing help or retry text; sensor still listening
    AwaitingRetryDelay,
    /// Showing a terminal message before closing
    Exiting,
    /// Finished
    Terminated(SessionOutcome),
}

impl SessionState {
    /// No further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminated(_))
    }

    /// Outcome, once terminated
    pub fn outcome(&self) -> Option<SessionOutcome> {
        match self {
            SessionState::Terminated(outcome) => Some(*outcome),
            _ => None,
        }
    }
}

/// Purpose of a delayed transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    /// Restore the title and keep listening
    Retry,
    /// Close the prompt
    Exit,
}

/// Identity of the one outstanding timer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTimer {
    pub slot: TimerSlot,
    pub generation: u64,
}

/// Input to the transition table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Caller started the session
    Start,
    /// Capability gate evaluated
    CapabilityEvaluated(CapabilityResult),
    /// The attempt could not be started
    AttemptUnavailable(String),
    /// Event from the attempt's outcome stream
    Outcome(AttemptOutcome),
    /// A delayed transition came due
    TimerFired { slot: TimerSlot, generation: u64 },
    /// User chose the non-biometric path
    FallbackRequested,
    /// Prompt dismissed from outside
    Dismiss,
}

/// Side effect requested by the transition table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Query the capability gate and feed back `CapabilityEvaluated`
    EvaluateCapability,
    /// Allocate the token and start the hardware attempt
    StartAttempt,
    /// Replace the prompt message
    ShowMessage(String),
    /// Haptic feedback
    Vibrate(Duration),
    /// Arm the single timer, replacing any armed one
    ScheduleTimer {
        slot: TimerSlot,
        generation: u64,
        delay: Duration,
    },
    /// Disarm the timer
    CancelTimer,
    /// Signal the attempt token
    SignalToken,
    /// Hand a hard error to the caller before it is discarded
    ReportError {
        code: Option<ErrorCode>,
        message: String,
    },
    /// Invoke the success callback
    NotifySuccess(AuthenticationResult),
    /// Invoke the fallback callback
    NotifyFallback,
    /// Close the prompt
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenState {
    Unallocated,
    Live,
    Signaled,
}

/// Pure session state machine
#[derive(Debug)]
pub struct SessionMachine {
    config: SessionConfig,
    state: SessionState,
    token: TokenState,
    pending: Option<PendingTimer>,
    generation: u64,
    exit_outcome: Option<SessionOutcome>,
}

impl SessionMachine {
    /// Machine in `Initializing`
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Initializing,
            token: TokenState::Unallocated,
            pending: None,
            generation: 0,
            exit_outcome: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The timer that would currently take effect if it fired
    pub fn pending_timer(&self) -> Option<PendingTimer> {
        self.pending
    }

    /// Whether an attempt token was ever allocated
    pub fn token_allocated(&self) -> bool {
        self.token != TokenState::Unallocated
    }

    /// Whether the attempt token has been signaled
    pub fn token_signaled(&self) -> bool {
        self.token == TokenState::Signaled
    }

    /// Outcome the session will report when the exit timer fires
    pub fn exit_outcome(&self) -> Option<SessionOutcome> {
        self.exit_outcome
    }

    /// Apply one event and return the effects to carry out
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.state.is_terminal() {
            debug!(state = ?self.state, ?event, "Session terminated, ignoring event");
            return effects;
        }

        match (self.state, event) {
            (_, SessionEvent::Dismiss) => {
                self.terminate(SessionOutcome::UserCancelled, &mut effects);
            }
            (_, SessionEvent::FallbackRequested) => {
                self.cancel_timer(&mut effects);
                self.signal_token(&mut effects);
                effects.push(Effect::NotifyFallback);
                effects.push(Effect::Close);
                self.state = SessionState::Terminated(SessionOutcome::UserCancelled);
            }
            (SessionState::Initializing, SessionEvent::Start) => {
                self.state = SessionState::Checking;
                effects.push(Effect::ShowMessage(self.config.messages.title.clone()));
                effects.push(Effect::EvaluateCapability);
            }
            (SessionState::Checking, SessionEvent::CapabilityEvaluated(result)) => {
                if result.is_ready() {
                    self.token = TokenState::Live;
                    self.state = SessionState::Attempting;
                    effects.push(Effect::StartAttempt);
                } else {
                    let message = result
                        .remediation()
                        .unwrap_or("Biometric authentication unavailable")
                        .to_string();
                    self.begin_exit(SessionOutcome::Ineligible, message, &mut effects);
                }
            }
            (
                SessionState::Attempting | SessionState::AwaitingRetryDelay,
                SessionEvent::AttemptUnavailable(reason),
            ) => {
                effects.push(Effect::ReportError {
                    code: None,
                    message: reason.clone(),
                });
                self.signal_token(&mut effects);
                self.begin_exit(SessionOutcome::Failed, reason, &mut effects);
            }
            (
                SessionState::Attempting | SessionState::AwaitingRetryDelay,
                SessionEvent::Outcome(outcome),
            ) => {
                self.on_outcome(outcome, &mut effects);
            }
            (
                SessionState::AwaitingRetryDelay,
                SessionEvent::TimerFired {
                    slot: TimerSlot::Retry,
                    generation,
                },
            ) if self.is_pending(TimerSlot::Retry, generation) => {
                self.pending = None;
                self.state = SessionState::Attempting;
                effects.push(Effect::ShowMessage(self.config.messages.title.clone()));
            }
            (
                SessionState::Exiting,
                SessionEvent::TimerFired {
                    slot: TimerSlot::Exit,
                    generation,
                },
            ) if self.is_pending(TimerSlot::Exit, generation) => {
                self.pending = None;
                let outcome = self.exit_outcome.take().unwrap_or(SessionOutcome::Failed);
                self.terminate(outcome, &mut effects);
            }
            (state, event) => {
                debug!(?state, ?event, "No transition for event");
            }
        }

        effects
    }

    fn on_outcome(&mut self, outcome: AttemptOutcome, effects: &mut Vec<Effect>) {
        match outcome {
            AttemptOutcome::Succeeded(result) => {
                self.cancel_timer(effects);
                self.signal_token(effects);
                effects.push(Effect::NotifySuccess(result));
                effects.push(Effect::Close);
                self.state = SessionState::Terminated(SessionOutcome::Succeeded);
            }
            AttemptOutcome::Help { message, .. } => {
                self.state = SessionState::AwaitingRetryDelay;
                effects.push(Effect::ShowMessage(message));
                effects.push(Effect::Vibrate(self.config.haptic_duration()));
                self.schedule(TimerSlot::Retry, self.config.retry_delay(), effects);
            }
            AttemptOutcome::FailedMatch => {
                self.state = SessionState::AwaitingRetryDelay;
                effects.push(Effect::ShowMessage(self.config.messages.try_again.clone()));
                self.schedule(TimerSlot::Retry, self.config.retry_delay(), effects);
            }
            AttemptOutcome::Error { code, message } => {
                effects.push(Effect::ReportError {
                    code: Some(code),
                    message: message.clone(),
                });
                self.signal_token(effects);
                self.begin_exit(SessionOutcome::Failed, message, effects);
            }
        }
    }

    fn begin_exit(&mut self, outcome: SessionOutcome, message: String, effects: &mut Vec<Effect>) {
        self.state = SessionState::Exiting;
        self.exit_outcome = Some(outcome);
        effects.push(Effect::ShowMessage(message));
        self.schedule(TimerSlot::Exit, self.config.exit_delay(), effects);
    }

    fn terminate(&mut self, outcome: SessionOutcome, effects: &mut Vec<Effect>) {
        self.cancel_timer(effects);
        self.signal_token(effects);
        effects.push(Effect::Close);
        self.state = SessionState::Terminated(outcome);
    }

    fn schedule(&mut self, slot: TimerSlot, delay: Duration, effects: &mut Vec<Effect>) {
        self.generation += 1;
        self.pending = Some(PendingTimer {
            slot,
            generation: self.generation,
        });
        effects.push(Effect::ScheduleTimer {
            slot,
            generation: self.generation,
            delay,
        });
    }

    fn cancel_timer(&mut self, effects: &mut Vec<Effect>) {
        if self.pending.take().is_some() {
            self.generation += 1;
            effects.push(Effect::CancelTimer);
        }
    }

    fn signal_token(&mut self, effects: &mut Vec<Effect>) {
        if self.token == TokenState::Live {
            self.token = TokenState::Signaled;
            effects.push(Effect::SignalToken);
        }
    }

    fn is_pending(&self, slot: TimerSlot, generation: u64) -> bool {
        self.pending == Some(PendingTimer { slot, generation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> CapabilityResult {
        CapabilityResult::new(true, true, true, true)
    }

    fn attempting() -> SessionMachine {
        let mut machine = SessionMachine::new(SessionConfig::default());
        machine.handle(SessionEvent::Start);
        machine.handle(SessionEvent::CapabilityEvaluated(ready()));
        assert_eq!(machine.state(), SessionState::Attempting);
        machine
    }

    fn scheduled(effects: &[Effect]) -> Option<(TimerSlot, u64)> {
        effects.iter().find_map(|effect| match effect {
            Effect::ScheduleTimer {
                slot, generation, ..
            } => Some((*slot, *generation)),
            _ => None,
        })
    }

    #[test]
    fn test_start_shows_title_and_checks() {
        let mut machine = SessionMachine::new(SessionConfig::default());
        let effects = machine.handle(SessionEvent::Start);

        assert_eq!(machine.state(), SessionState::Checking);
        assert_eq!(
            effects,
            vec![
                Effect::ShowMessage("Touch the fingerprint sensor".to_string()),
                Effect::EvaluateCapability
            ]
        );
    }

    #[test]
    fn test_ready_capability_starts_attempt() {
        let mut machine = SessionMachine::new(SessionConfig::default());
        machine.handle(SessionEvent::Start);
        let effects = machine.handle(SessionEvent::CapabilityEvaluated(ready()));

        assert_eq!(effects, vec![Effect::StartAttempt]);
        assert!(machine.token_allocated());
        assert!(!machine.token_signaled());
    }

    #[test]
    fn test_ineligible_schedules_exit_without_token() {
        let mut machine = SessionMachine::new(SessionConfig::default());
        machine.handle(SessionEvent::Start);
        let effects = machine.handle(SessionEvent::CapabilityEvaluated(CapabilityResult::new(
            true, true, false, true,
        )));

        assert_eq!(machine.state(), SessionState::Exiting);
        assert_eq!(machine.exit_outcome(), Some(SessionOutcome::Ineligible));
        assert!(!effects.contains(&Effect::StartAttempt));
        assert!(effects.contains(&Effect::ShowMessage(
            "Enroll at least one fingerprint in settings".to_string()
        )));

        let (slot, generation) = scheduled(&effects).unwrap();
        assert_eq!(slot, TimerSlot::Exit);

        let effects = machine.handle(SessionEvent::TimerFired { slot, generation });
        assert_eq!(effects, vec![Effect::Close]);
        assert_eq!(
            machine.state(),
            SessionState::Terminated(SessionOutcome::Ineligible)
        );
        assert!(!machine.token_allocated());
    }

    #[test]
    fn test_success_terminates_immediately() {
        let mut machine = attempting();
        let result = AuthenticationResult::new();
        let effects = machine.handle(SessionEvent::Outcome(AttemptOutcome::Succeeded(
            result.clone(),
        )));

        assert_eq!(
            effects,
            vec![
                Effect::SignalToken,
                Effect::NotifySuccess(result),
                Effect::Close
            ]
        );
        assert_eq!(
            machine.state(),
            SessionState::Terminated(SessionOutcome::Succeeded)
        );
    }

    #[test]
    fn test_help_vibrates_and_keeps_token() {
        let mut machine = attempting();
        let effects = machine.handle(SessionEvent::Outcome(AttemptOutcome::help(
            5,
            "Finger moved too fast",
        )));

        assert_eq!(machine.state(), SessionState::AwaitingRetryDelay);
        assert_eq!(
            effects[..2],
            [
                Effect::ShowMessage("Finger moved too fast".to_string()),
                Effect::Vibrate(Duration::from_millis(200))
            ]
        );
        assert!(!effects.contains(&Effect::SignalToken));
        assert!(!machine.token_signaled());

        let (slot, generation) = scheduled(&effects).unwrap();
        let effects = machine.handle(SessionEvent::TimerFired { slot, generation });
        assert_eq!(machine.state(), SessionState::Attempting);
        assert_eq!(
            effects,
            vec![Effect::ShowMessage("Touch the fingerprint sensor".to_string())]
        );
    }

    #[test]
    fn test_failed_match_does_not_vibrate() {
        let mut machine = attempting();
        let effects = machine.handle(SessionEvent::Outcome(AttemptOutcome::FailedMatch));

        assert_eq!(machine.state(), SessionState::AwaitingRetryDelay);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Vibrate(_))));
        assert_eq!(
            effects[0],
            Effect::ShowMessage("Not recognized, try again".to_string())
        );
    }

    #[test]
    fn test_second_retry_replaces_first_timer() {
        let mut machine = attempting();
        let first = machine.handle(SessionEvent::Outcome(AttemptOutcome::FailedMatch));
        let second = machine.handle(SessionEvent::Outcome(AttemptOutcome::FailedMatch));

        let (slot, stale) = scheduled(&first).unwrap();
        let (_, fresh) = scheduled(&second).unwrap();
        assert_ne!(stale, fresh);

        let effects = machine.handle(SessionEvent::TimerFired {
            slot,
            generation: stale,
        });
        assert!(effects.is_empty());
        assert_eq!(machine.state(), SessionState::AwaitingRetryDelay);

        machine.handle(SessionEvent::TimerFired {
            slot,
            generation: fresh,
        });
        assert_eq!(machine.state(), SessionState::Attempting);
    }

    #[test]
    fn test_error_signals_token_and_exits() {
        let mut machine = attempting();
        let effects = machine.handle(SessionEvent::Outcome(AttemptOutcome::error(
            ErrorCode::Lockout,
            "Too many attempts",
        )));

        assert_eq!(machine.state(), SessionState::Exiting);
        assert_eq!(
            effects[..3],
            [
                Effect::ReportError {
                    code: Some(ErrorCode::Lockout),
                    message: "Too many attempts".to_string()
                },
                Effect::SignalToken,
                Effect::ShowMessage("Too many attempts".to_string())
            ]
        );

        let (slot, generation) = scheduled(&effects).unwrap();
        let effects = machine.handle(SessionEvent::TimerFired { slot, generation });
        assert_eq!(effects, vec![Effect::Close]);
        assert_eq!(
            machine.state(),
            SessionState::Terminated(SessionOutcome::Failed)
        );
    }

    #[test]
    fn test_attempt_unavailable_fails_session() {
        let mut machine = attempting();
        let effects = machine.handle(SessionEvent::AttemptUnavailable("sensor busy".to_string()));

        assert_eq!(machine.state(), SessionState::Exiting);
        assert_eq!(machine.exit_outcome(), Some(SessionOutcome::Failed));
        assert!(effects.contains(&Effect::ReportError {
            code: None,
            message: "sensor busy".to_string()
        }));
        assert!(machine.token_signaled());
    }

    #[test]
    fn test_dismiss_discards_pending_retry() {
        let mut machine = attempting();
        let effects = machine.handle(SessionEvent::Outcome(AttemptOutcome::FailedMatch));
        let (slot, generation) = scheduled(&effects).unwrap();

        let effects = machine.handle(SessionEvent::Dismiss);
        assert_eq!(
            effects,
            vec![Effect::CancelTimer, Effect::SignalToken, Effect::Close]
        );

        let effects = machine.handle(SessionEvent::TimerFired { slot, generation });
        assert!(effects.is_empty());
        assert_eq!(
            machine.state(),
            SessionState::Terminated(SessionOutcome::UserCancelled)
        );
    }

    #[test]
    fn test_dismiss_twice_is_noop() {
        let mut machine = attempting();
        let first = machine.handle(SessionEvent::Dismiss);
        let second = machine.handle(SessionEvent::Dismiss);

        assert!(!first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn test_fallback_notifies_and_closes() {
        let mut machine = attempting();
        machine.handle(SessionEvent::Outcome(AttemptOutcome::help(1, "Press harder")));
        let effects = machine.handle(SessionEvent::FallbackRequested);

        assert_eq!(
            effects,
            vec![
                Effect::CancelTimer,
                Effect::SignalToken,
                Effect::NotifyFallback,
                Effect::Close
            ]
        );
        assert_eq!(machine.pending_timer(), None);
    }

    #[test]
    fn test_dismiss_before_start() {
        let mut machine = SessionMachine::new(SessionConfig::default());
        let effects = machine.handle(SessionEvent::Dismiss);
        assert_eq!(effects, vec![Effect::Close]);

        assert!(machine.handle(SessionEvent::Start).is_empty());
        assert_eq!(
            machine.state(),
            SessionState::Terminated(SessionOutcome::UserCancelled)
        );
    }

    #[test]
    fn test_outcomes_ignored_while_exiting() {
        let mut machine = attempting();
        machine.handle(SessionEvent::Outcome(AttemptOutcome::error(
            ErrorCode::Canceled,
            "Operation cancelled",
        )));
        let effects = machine.handle(SessionEvent::Outcome(AttemptOutcome::Succeeded(
            AuthenticationResult::new(),
        )));

        assert!(effects.is_empty());
        assert_eq!(machine.state(), SessionState::Exiting);
    }

    #[test]
    fn test_success_during_retry_delay() {
        let mut machine = attempting();
        machine.handle(SessionEvent::Outcome(AttemptOutcome::FailedMatch));
        let effects = machine.handle(SessionEvent::Outcome(AttemptOutcome::Succeeded(
            AuthenticationResult::new(),
        )));

        assert_eq!(effects[0], Effect::CancelTimer);
        assert_eq!(
            machine.state(),
            SessionState::Terminated(SessionOutcome::Succeeded)
        );
    }
}
