//! Synchronous retry state machine
//!
//! Holds no timers and runs no futures. Each transition mutates the state and
//! returns the events it produced; the async controller owns scheduling and
//! dispatch.

use std::time::Duration;

use crate::backoff::BackoffStrategy;
use crate::error::{ActionError, ControllerError};
use crate::events::{AnalyticsEvent, AnalyticsKind, RetryEvent};
use crate::options::{AttemptCounting, ControllerConfig};
use crate::types::{RetryAttempt, RetrySnapshot, RetryStatus};

/// What follows a settled attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Back to idle with the error cleared.
    Succeeded,
    /// Failed; the cooldown of this length has started.
    Cooldown(Duration),
    /// Failed with zero backoff; idle again right away.
    Ready,
    /// Failed and the ceiling is reached.
    Exhausted,
}

#[derive(Debug)]
pub(crate) struct RetryState {
    status: RetryStatus,
    attempt: u32,
    max_attempts: u32,
    controlled: bool,
    cooldown: Duration,
    strategy: BackoffStrategy,
    last_error: Option<ActionError>,
    cooldown_remaining: Duration,
    terminal_announced: bool,
}

impl RetryState {
    /// Callers validate `config` first.
    pub(crate) fn new(config: &ControllerConfig) -> Self {
        let max_attempts = config.counting.max_attempts();
        let attempt = config.counting.initial_attempt().min(max_attempts);
        let status = if attempt >= max_attempts {
            RetryStatus::MaxAttemptsReached
        } else {
            RetryStatus::Idle
        };
        Self {
            status,
            attempt,
            max_attempts,
            controlled: matches!(config.counting, AttemptCounting::Controlled { .. }),
            cooldown: config.cooldown,
            strategy: config.strategy,
            last_error: None,
            cooldown_remaining: Duration::ZERO,
            // A controller constructed already exhausted announces nothing.
            terminal_announced: status == RetryStatus::MaxAttemptsReached,
        }
    }

    pub(crate) fn status(&self) -> RetryStatus {
        self.status
    }

    pub(crate) fn cooldown_remaining(&self) -> Duration {
        self.cooldown_remaining
    }

    pub(crate) fn snapshot(&self) -> RetrySnapshot {
        RetrySnapshot {
            status: self.status,
            attempt_number: self.attempt,
            max_attempts: self.max_attempts,
            last_error: self.last_error.clone(),
            cooldown_remaining: self.cooldown_remaining,
            controlled: self.controlled,
        }
    }

    fn analytics(&self, kind: AnalyticsKind, attempt_number: u32) -> RetryEvent {
        RetryEvent::Analytics(AnalyticsEvent::new(kind, attempt_number, self.max_attempts))
    }

    /// The 1-indexed number of the attempt that runs next.
    fn next_attempt_number(&self) -> u32 {
        self.attempt.saturating_add(1).min(self.max_attempts)
    }

    /// `Idle` → `Loading`. Returns `None` (a no-op) in any other phase or
    /// once the counter sits at the ceiling.
    pub(crate) fn begin_attempt(&mut self) -> Option<(u32, Vec<RetryEvent>)> {
        if !self.status.accepts_trigger() || self.attempt >= self.max_attempts {
            return None;
        }
        self.status = RetryStatus::Loading;
        let attempt_number = self.next_attempt_number();
        Some((
            attempt_number,
            vec![
                RetryEvent::BeforeRetry { attempt_number },
                self.analytics(AnalyticsKind::AttemptStarted, attempt_number),
            ],
        ))
    }

    /// `Loading` → `Idle` | `Cooldown` | `MaxAttemptsReached`.
    pub(crate) fn settle(
        &mut self,
        attempt_number: u32,
        outcome: Result<(), ActionError>,
        duration: Duration,
    ) -> (NextStep, Vec<RetryEvent>) {
        debug_assert_eq!(self.status, RetryStatus::Loading);
        let mut events = Vec::with_capacity(4);

        let error = match outcome {
            Ok(()) => {
                self.status = RetryStatus::Idle;
                self.last_error = None;
                self.cooldown_remaining = Duration::ZERO;
                events.push(RetryEvent::AfterRetry(RetryAttempt::succeeded(
                    attempt_number,
                    duration,
                )));
                events.push(self.analytics(AnalyticsKind::AttemptSucceeded, attempt_number));
                return (NextStep::Succeeded, events);
            }
            Err(error) => error,
        };

        self.status = RetryStatus::Error;
        self.last_error = Some(error.clone());
        // In controlled mode the caller owns the counter; the completed
        // attempt number is derived from its value without storing it.
        let completed = if self.controlled {
            attempt_number
        } else {
            self.attempt = self.attempt.saturating_add(1).min(self.max_attempts);
            self.attempt
        };
        events.push(RetryEvent::AfterRetry(RetryAttempt::failed(
            completed, duration, error,
        )));
        events.push(self.analytics(AnalyticsKind::AttemptFailed, completed));

        // A caller may have moved its counter to the ceiling mid-attempt.
        if completed.max(self.attempt) >= self.max_attempts {
            self.status = RetryStatus::MaxAttemptsReached;
            self.announce_terminal(completed, &mut events);
            return (NextStep::Exhausted, events);
        }

        let delay = self.strategy.delay(completed, self.cooldown);
        if delay.is_zero() {
            self.status = RetryStatus::Idle;
            return (NextStep::Ready, events);
        }

        self.status = RetryStatus::Cooldown;
        self.cooldown_remaining = delay;
        events.push(RetryEvent::CooldownStart { duration: delay });
        events.push(self.analytics(AnalyticsKind::CooldownStarted, completed));
        (NextStep::Cooldown(delay), events)
    }

    fn announce_terminal(&mut self, attempt_number: u32, events: &mut Vec<RetryEvent>) {
        if self.terminal_announced {
            return;
        }
        self.terminal_announced = true;
        events.push(RetryEvent::MaxAttemptsReached { attempt_number });
        events.push(self.analytics(AnalyticsKind::MaxAttemptsReached, attempt_number));
    }

    /// Count down by `elapsed`. Returns `(events, finished)`; once finished
    /// the timer must stop. A cooldown that ends with the counter at the
    /// ceiling goes terminal instead of idle.
    pub(crate) fn tick(&mut self, elapsed: Duration) -> (Vec<RetryEvent>, bool) {
        if self.status != RetryStatus::Cooldown {
            return (Vec::new(), true);
        }
        self.cooldown_remaining = self.cooldown_remaining.saturating_sub(elapsed);
        if !self.cooldown_remaining.is_zero() {
            return (
                vec![RetryEvent::CooldownTick {
                    remaining: self.cooldown_remaining,
                }],
                false,
            );
        }
        let mut events = vec![
            RetryEvent::CooldownEnd,
            self.analytics(AnalyticsKind::CooldownEnded, self.attempt),
        ];
        if self.attempt >= self.max_attempts {
            self.status = RetryStatus::MaxAttemptsReached;
            self.announce_terminal(self.attempt, &mut events);
        } else {
            self.status = RetryStatus::Idle;
        }
        (events, true)
    }

    /// Back to the initial phase with the counter at zero. Any in-flight
    /// attempt or running cooldown is abandoned by the caller.
    pub(crate) fn reset(&mut self) -> Vec<RetryEvent> {
        self.status = RetryStatus::Idle;
        self.attempt = 0;
        self.last_error = None;
        self.cooldown_remaining = Duration::ZERO;
        self.terminal_announced = false;
        vec![self.analytics(AnalyticsKind::Reset, 0)]
    }

    /// Apply a caller-supplied counter value (controlled mode only).
    ///
    /// Zero is an external reset. A value at the ceiling exhausts an idle
    /// controller. Any other value only updates what is displayed.
    pub(crate) fn set_current_attempt(
        &mut self,
        attempt: u32,
    ) -> Result<SetAttempt, ControllerError> {
        if !self.controlled {
            return Err(ControllerError::NotControlled);
        }
        if attempt > self.max_attempts {
            return Err(ControllerError::AttemptOutOfRange {
                attempt,
                max_attempts: self.max_attempts,
            });
        }
        if attempt == 0 {
            return Ok(SetAttempt::Reset(self.reset()));
        }
        self.attempt = attempt;
        let mut events = Vec::new();
        if attempt >= self.max_attempts && self.status == RetryStatus::Idle {
            self.status = RetryStatus::MaxAttemptsReached;
            self.announce_terminal(attempt, &mut events);
        }
        Ok(SetAttempt::Updated(events))
    }
}

/// Result of [`RetryState::set_current_attempt`].
#[derive(Debug)]
pub(crate) enum SetAttempt {
    /// The counter went back to zero; outstanding work must be invalidated.
    Reset(Vec<RetryEvent>),
    Updated(Vec<RetryEvent>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn failure() -> Result<(), ActionError> {
        Err(ActionError::from(anyhow::anyhow!("boom")))
    }

    fn names(events: &[RetryEvent]) -> Vec<&'static str> {
        events.iter().map(RetryEvent::name).collect()
    }

    fn constant(max_attempts: u32) -> RetryState {
        RetryState::new(
            &ControllerConfig::uncontrolled(max_attempts).strategy(BackoffStrategy::Constant),
        )
    }

    fn fail_once(state: &mut RetryState) -> (NextStep, Vec<RetryEvent>) {
        let (n, _) = state.begin_attempt().expect("idle state accepts trigger");
        state.settle(n, failure(), Duration::from_millis(5))
    }

    fn drain_cooldown(state: &mut RetryState) {
        let (_, finished) = state.tick(Duration::from_secs(60));
        assert!(finished);
    }

    #[test]
    fn initial_state_is_idle_at_zero() {
        let state = constant(3);
        let snapshot = state.snapshot();
        assert_eq!(RetryStatus::Idle, snapshot.status);
        assert_eq!(0, snapshot.attempt_number);
        assert_eq!(3, snapshot.max_attempts);
        assert!(!snapshot.controlled);
    }

    #[test]
    fn begin_attempt_is_noop_unless_idle() {
        let mut state = constant(3);
        let (n, events) = state.begin_attempt().unwrap();
        assert_eq!(1, n);
        assert_eq!(vec!["before_retry", "analytics"], names(&events));

        assert!(state.begin_attempt().is_none());
        assert_eq!(RetryStatus::Loading, state.status());
    }

    #[test]
    fn failure_enters_cooldown_with_backoff_delay() {
        let mut state = RetryState::new(
            &ControllerConfig::uncontrolled(5)
                .strategy(BackoffStrategy::Linear)
                .cooldown(Duration::from_millis(1000)),
        );
        fail_once(&mut state);
        drain_cooldown(&mut state);

        let (next, events) = fail_once(&mut state);

        assert_eq!(NextStep::Cooldown(Duration::from_millis(2000)), next);
        assert_eq!(
            vec!["after_retry", "analytics", "cooldown_start", "analytics"],
            names(&events)
        );
        let snapshot = state.snapshot();
        assert_eq!(RetryStatus::Cooldown, snapshot.status);
        assert_eq!(2, snapshot.attempt_number);
        assert_eq!(Duration::from_millis(2000), snapshot.cooldown_remaining);
        assert!(snapshot.last_error.is_some());
    }

    #[test]
    fn success_clears_error_and_keeps_counter() {
        let mut state = constant(3);
        fail_once(&mut state);
        drain_cooldown(&mut state);

        let (n, _) = state.begin_attempt().unwrap();
        let (next, events) = state.settle(n, Ok(()), Duration::ZERO);

        assert_eq!(NextStep::Succeeded, next);
        assert_eq!(vec!["after_retry", "analytics"], names(&events));
        let snapshot = state.snapshot();
        assert_eq!(RetryStatus::Idle, snapshot.status);
        assert!(snapshot.last_error.is_none());
        assert_eq!(1, snapshot.attempt_number);
    }

    #[test]
    fn tick_counts_down_then_returns_to_idle() {
        let mut state = constant(3);
        fail_once(&mut state);

        let (events, finished) = state.tick(Duration::from_millis(400));
        assert!(!finished);
        assert!(matches!(
            events.as_slice(),
            [RetryEvent::CooldownTick { remaining }] if *remaining == Duration::from_millis(600)
        ));

        let (events, finished) = state.tick(Duration::from_millis(600));
        assert!(finished);
        assert_eq!(vec!["cooldown_end", "analytics"], names(&events));
        assert_eq!(RetryStatus::Idle, state.status());
        assert_eq!(Duration::ZERO, state.snapshot().cooldown_remaining);
    }

    #[test]
    fn tick_outside_cooldown_finishes_silently() {
        let mut state = constant(3);
        let (events, finished) = state.tick(Duration::from_millis(100));
        assert!(events.is_empty());
        assert!(finished);
    }

    #[test]
    fn three_constant_failures_exhaust_and_announce_once() {
        let mut state = constant(3);
        fail_once(&mut state);
        drain_cooldown(&mut state);
        fail_once(&mut state);
        drain_cooldown(&mut state);

        let (next, events) = fail_once(&mut state);

        assert_eq!(NextStep::Exhausted, next);
        assert_eq!(
            vec!["after_retry", "analytics", "max_attempts_reached", "analytics"],
            names(&events)
        );
        assert_eq!(RetryStatus::MaxAttemptsReached, state.status());
        assert_eq!(3, state.snapshot().attempt_number);
        assert!(state.begin_attempt().is_none());
    }

    #[test]
    fn immediate_strategy_skips_cooldown() {
        let config = ControllerConfig::uncontrolled(3).strategy(BackoffStrategy::Immediate);
        let mut state = RetryState::new(&config);

        let (next, events) = fail_once(&mut state);

        assert_eq!(NextStep::Ready, next);
        assert_eq!(vec!["after_retry", "analytics"], names(&events));
        assert_eq!(RetryStatus::Idle, state.status());
        assert_eq!(Duration::ZERO, state.snapshot().cooldown_remaining);
    }

    #[test]
    fn reset_leaves_terminal_state() {
        let mut state = constant(1);
        fail_once(&mut state);
        assert_eq!(RetryStatus::MaxAttemptsReached, state.status());

        let events = state.reset();

        assert_eq!(vec!["analytics"], names(&events));
        assert_eq!(RetryStatus::Idle, state.status());
        assert_eq!(0, state.snapshot().attempt_number);
        assert!(state.snapshot().last_error.is_none());

        let (_, events) = fail_once(&mut state);
        assert!(names(&events).contains(&"max_attempts_reached"));
    }

    #[test]
    fn controlled_mode_uses_external_counter() {
        let mut state = RetryState::new(
            &ControllerConfig::controlled(2, 5).strategy(BackoffStrategy::Constant),
        );
        assert_eq!(2, state.snapshot().attempt_number);

        let (n, _) = state.begin_attempt().unwrap();
        assert_eq!(3, n);
        let (next, events) = state.settle(n, failure(), Duration::ZERO);

        assert!(matches!(next, NextStep::Cooldown(_)));
        assert!(matches!(
            events.first(),
            Some(RetryEvent::AfterRetry(attempt)) if attempt.attempt_number == 3
        ));
        // Not incremented until the caller says so.
        assert_eq!(2, state.snapshot().attempt_number);

        let outcome = state.set_current_attempt(3).unwrap();
        assert!(matches!(outcome, SetAttempt::Updated(ref events) if events.is_empty()));
        assert_eq!(3, state.snapshot().attempt_number);
    }

    #[test]
    fn controlled_failure_at_ceiling_is_terminal() {
        let mut state = RetryState::new(&ControllerConfig::controlled(2, 3));
        let (next, _) = fail_once(&mut state);
        assert_eq!(NextStep::Exhausted, next);
        assert_eq!(RetryStatus::MaxAttemptsReached, state.status());
    }

    #[test]
    fn controlled_start_at_ceiling_is_exhausted_without_announcement() {
        let mut state = RetryState::new(&ControllerConfig::controlled(3, 3));
        assert_eq!(RetryStatus::MaxAttemptsReached, state.status());
        assert!(state.begin_attempt().is_none());

        match state.set_current_attempt(0).unwrap() {
            SetAttempt::Reset(events) => assert_eq!(vec!["analytics"], names(&events)),
            SetAttempt::Updated(_) => panic!("zero must reset"),
        }
        assert_eq!(RetryStatus::Idle, state.status());
    }

    #[test]
    fn controlled_value_at_ceiling_exhausts_idle_controller() {
        let mut state = RetryState::new(&ControllerConfig::controlled(0, 2));
        match state.set_current_attempt(2).unwrap() {
            SetAttempt::Updated(events) => {
                assert_eq!(vec!["max_attempts_reached", "analytics"], names(&events));
            }
            SetAttempt::Reset(_) => panic!("non-zero must not reset"),
        }
        assert_eq!(RetryStatus::MaxAttemptsReached, state.status());
    }

    #[test]
    fn ceiling_set_during_cooldown_ends_terminal() {
        let mut state = RetryState::new(
            &ControllerConfig::controlled(0, 3).strategy(BackoffStrategy::Constant),
        );
        fail_once(&mut state);
        assert_eq!(RetryStatus::Cooldown, state.status());

        match state.set_current_attempt(3).unwrap() {
            SetAttempt::Updated(events) => assert!(events.is_empty()),
            SetAttempt::Reset(_) => panic!("non-zero must not reset"),
        }
        let (events, finished) = state.tick(Duration::from_secs(60));

        assert!(finished);
        assert_eq!(
            vec!["cooldown_end", "analytics", "max_attempts_reached", "analytics"],
            names(&events)
        );
        assert_eq!(RetryStatus::MaxAttemptsReached, state.status());
        assert!(state.begin_attempt().is_none());
    }

    #[test]
    fn ceiling_set_while_loading_makes_the_failure_terminal() {
        let mut state = RetryState::new(
            &ControllerConfig::controlled(0, 3).strategy(BackoffStrategy::Constant),
        );
        let (n, _) = state.begin_attempt().unwrap();
        state.set_current_attempt(3).unwrap();

        let (next, events) = state.settle(n, failure(), Duration::ZERO);

        assert_eq!(NextStep::Exhausted, next);
        assert!(names(&events).contains(&"max_attempts_reached"));
        assert_eq!(RetryStatus::MaxAttemptsReached, state.status());
    }

    #[test]
    fn idle_at_ceiling_refuses_to_start() {
        let mut state = RetryState::new(&ControllerConfig::controlled(0, 2));
        let (n, _) = state.begin_attempt().unwrap();
        state.set_current_attempt(2).unwrap();
        state.settle(n, Ok(()), Duration::ZERO);
        assert_eq!(RetryStatus::Idle, state.status());

        assert!(state.begin_attempt().is_none());
        assert_eq!(RetryStatus::Idle, state.status());
    }

    #[test]
    fn set_current_attempt_validates_mode_and_range() {
        let mut uncontrolled = constant(3);
        assert_eq!(
            Err(ControllerError::NotControlled),
            uncontrolled.set_current_attempt(1).map(|_| ())
        );

        let mut controlled = RetryState::new(&ControllerConfig::controlled(0, 3));
        assert_eq!(
            Err(ControllerError::AttemptOutOfRange {
                attempt: 4,
                max_attempts: 3
            }),
            controlled.set_current_attempt(4).map(|_| ())
        );
    }
}
