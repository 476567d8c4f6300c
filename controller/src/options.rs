//! Typed controller configuration

use std::time::Duration;

use crate::backoff::BackoffStrategy;
use crate::error::{ControllerError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1000);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Who owns the attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptCounting {
    /// The controller increments its own counter on each failure.
    Uncontrolled { max_attempts: u32 },
    /// The caller supplies the counter and updates it through
    /// [`RetryHandle::set_current_attempt`](crate::RetryHandle::set_current_attempt).
    Controlled {
        current_attempt: u32,
        max_attempts: u32,
    },
}

impl AttemptCounting {
    pub fn max_attempts(&self) -> u32 {
        match *self {
            AttemptCounting::Uncontrolled { max_attempts }
            | AttemptCounting::Controlled { max_attempts, .. } => max_attempts,
        }
    }

    pub fn initial_attempt(&self) -> u32 {
        match *self {
            AttemptCounting::Uncontrolled { .. } => 0,
            AttemptCounting::Controlled {
                current_attempt, ..
            } => current_attempt,
        }
    }

    pub fn is_controlled(&self) -> bool {
        matches!(self, AttemptCounting::Controlled { .. })
    }
}

/// Everything a [`RetryController`](crate::RetryController) needs besides
/// the action itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub counting: AttemptCounting,
    /// Base cooldown fed to the backoff strategy
    pub cooldown: Duration,
    pub strategy: BackoffStrategy,
    /// Re-trigger automatically when a cooldown ends (or right away for
    /// zero-length backoff).
    pub auto_retry: bool,
    /// Granularity of the cooldown countdown
    pub tick_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::uncontrolled(DEFAULT_MAX_ATTEMPTS)
    }
}

impl ControllerConfig {
    pub fn uncontrolled(max_attempts: u32) -> Self {
        Self::with_counting(AttemptCounting::Uncontrolled { max_attempts })
    }

    pub fn controlled(current_attempt: u32, max_attempts: u32) -> Self {
        Self::with_counting(AttemptCounting::Controlled {
            current_attempt,
            max_attempts,
        })
    }

    fn with_counting(counting: AttemptCounting) -> Self {
        Self {
            counting,
            cooldown: DEFAULT_COOLDOWN,
            strategy: BackoffStrategy::default(),
            auto_retry: false,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn auto_retry(mut self, enabled: bool) -> Self {
        self.auto_retry = enabled;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.counting.max_attempts()
    }

    /// Reject configurations the state machine cannot honour.
    pub fn validate(&self) -> Result<()> {
        let max_attempts = self.counting.max_attempts();
        if max_attempts < 1 {
            return Err(ControllerError::invalid(
                "max_attempts",
                format!("must be at least 1 (got {max_attempts})"),
            ));
        }
        if let AttemptCounting::Controlled {
            current_attempt, ..
        } = self.counting
            && current_attempt > max_attempts
        {
            return Err(ControllerError::invalid(
                "current_attempt",
                format!("must not exceed max_attempts {max_attempts} (got {current_attempt})"),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ControllerError::invalid(
                "tick_interval_ms",
                "must be greater than zero",
            ));
        }
        self.strategy.validate()
    }
}
