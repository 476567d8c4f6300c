//! Backoff strategies
//!
//! Maps the 1-indexed number of the attempt that just failed to the cooldown
//! that must elapse before the next attempt is allowed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ControllerError;

/// Hard ceiling for exponential backoff, regardless of multiplier or attempt.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Backoff calculation selected at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// Always the base cooldown.
    Constant,
    /// Base cooldown times the attempt number.
    Linear,
    /// Base cooldown times `multiplier^(attempt - 1)`, capped at [`MAX_BACKOFF`].
    Exponential { multiplier: f64 },
    /// No cooldown at all.
    Immediate,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential { multiplier: 2.0 }
    }
}

impl BackoffStrategy {
    /// Build a strategy from its configured name and multiplier.
    ///
    /// The multiplier is only consulted for `Exponential`.
    pub fn from_kind(kind: StrategyKind, multiplier: f64) -> Self {
        match kind {
            StrategyKind::Constant => BackoffStrategy::Constant,
            StrategyKind::Linear => BackoffStrategy::Linear,
            StrategyKind::Exponential => BackoffStrategy::Exponential { multiplier },
            StrategyKind::Immediate => BackoffStrategy::Immediate,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            BackoffStrategy::Constant => StrategyKind::Constant,
            BackoffStrategy::Linear => StrategyKind::Linear,
            BackoffStrategy::Exponential { .. } => StrategyKind::Exponential,
            BackoffStrategy::Immediate => StrategyKind::Immediate,
        }
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        if let BackoffStrategy::Exponential { multiplier } = *self
            && (!multiplier.is_finite() || multiplier < 1.0)
        {
            return Err(ControllerError::invalid(
                "backoff_multiplier",
                format!("must be a finite number >= 1 (got {multiplier})"),
            ));
        }
        Ok(())
    }

    /// Cooldown to apply after `attempt` (1-indexed) failed.
    ///
    /// Attempt 0 is treated as attempt 1. All arithmetic saturates.
    pub fn delay(&self, attempt: u32, base: Duration) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            BackoffStrategy::Constant => base,
            BackoffStrategy::Linear => base.saturating_mul(attempt),
            BackoffStrategy::Exponential { multiplier } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let scaled_ms = base.as_millis() as f64 * multiplier.powi(exponent);
                let cap_ms = MAX_BACKOFF.as_millis() as f64;
                if !scaled_ms.is_finite() || scaled_ms >= cap_ms {
                    MAX_BACKOFF
                } else {
                    Duration::from_millis(scaled_ms.round() as u64)
                }
            }
            BackoffStrategy::Immediate => Duration::ZERO,
        }
    }

    /// Delays for each attempt in `attempts`, in order.
    pub fn schedule(&self, base: Duration, attempts: Range<u32>) -> Vec<Duration> {
        attempts.map(|n| self.delay(n, base)).collect()
    }
}

/// Configurable strategy name, as it appears in config files and on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Constant,
    Linear,
    #[default]
    Exponential,
    Immediate,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Constant => "constant",
            StrategyKind::Linear => "linear",
            StrategyKind::Exponential => "exponential",
            StrategyKind::Immediate => "immediate",
        }
    }

    pub fn all() -> [Self; 4] {
        [
            StrategyKind::Constant,
            StrategyKind::Linear,
            StrategyKind::Exponential,
            StrategyKind::Immediate,
        ]
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        StrategyKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown retry strategy '{value}' (expected constant, linear, exponential or immediate)"
                )
            })
    }
}
