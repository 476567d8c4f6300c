//! Core types shared by the controller, its listeners and renderers

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ActionError;

/// Controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStatus {
    /// Ready to run the action.
    Idle,
    /// The action is in flight.
    Loading,
    /// Waiting out the backoff delay.
    Cooldown,
    /// A failed attempt has been recorded and the next phase is being
    /// decided. Never a resting state.
    Error,
    /// Terminal until the attempt counter is reset to zero.
    MaxAttemptsReached,
}

impl RetryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RetryStatus::Idle => "idle",
            RetryStatus::Loading => "loading",
            RetryStatus::Cooldown => "cooldown",
            RetryStatus::Error => "error",
            RetryStatus::MaxAttemptsReached => "max_attempts_reached",
        }
    }

    /// Whether a trigger in this phase would invoke the action.
    pub fn accepts_trigger(self) -> bool {
        matches!(self, RetryStatus::Idle)
    }
}

/// Record of one completed invocation. Emitted once, never retained.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// 1-indexed number of this attempt
    pub attempt_number: u32,
    pub success: bool,
    pub duration: Duration,
    /// Present iff `success == false`
    pub error: Option<ActionError>,
}

impl RetryAttempt {
    pub(crate) fn succeeded(attempt_number: u32, duration: Duration) -> Self {
        Self {
            attempt_number,
            success: true,
            duration,
            error: None,
        }
    }

    pub(crate) fn failed(attempt_number: u32, duration: Duration, error: ActionError) -> Self {
        Self {
            attempt_number,
            success: false,
            duration,
            error: Some(error),
        }
    }
}

/// Point-in-time copy of controller state, for rendering.
#[derive(Debug, Clone)]
pub struct RetrySnapshot {
    pub status: RetryStatus,
    /// Completed attempts (or the caller's value in controlled mode)
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub last_error: Option<ActionError>,
    /// Nonzero only while `status == Cooldown`
    pub cooldown_remaining: Duration,
    pub controlled: bool,
}

impl RetrySnapshot {
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt_number)
    }

    pub fn is_exhausted(&self) -> bool {
        self.status == RetryStatus::MaxAttemptsReached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn only_idle_accepts_trigger() {
        assert!(RetryStatus::Idle.accepts_trigger());
        for status in [
            RetryStatus::Loading,
            RetryStatus::Cooldown,
            RetryStatus::Error,
            RetryStatus::MaxAttemptsReached,
        ] {
            assert!(!status.accepts_trigger(), "{}", status.as_str());
        }
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&RetryStatus::MaxAttemptsReached).unwrap();
        assert_eq!("\"max_attempts_reached\"", json);
    }

    #[test]
    fn remaining_attempts_saturates() {
        let snapshot = RetrySnapshot {
            status: RetryStatus::Idle,
            attempt_number: 5,
            max_attempts: 3,
            last_error: None,
            cooldown_remaining: Duration::ZERO,
            controlled: true,
        };
        assert_eq!(0, snapshot.remaining_attempts());
    }
}
