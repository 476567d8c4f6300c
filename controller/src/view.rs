//! Button view model
//!
//! Maps a [`RetrySnapshot`] to what a retry button shows. Renderers (the CLI,
//! a TUI, a web shim) format this; they never inspect raw state.

use serde::Serialize;
use std::time::Duration;

use crate::types::{RetrySnapshot, RetryStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryView {
    pub label: String,
    /// The button cannot be pressed.
    pub disabled: bool,
    pub show_spinner: bool,
    /// Whole seconds left in the cooldown, rounded up. `None` outside cooldown.
    pub countdown_secs: Option<u64>,
}

impl RetryView {
    pub fn from_snapshot(snapshot: &RetrySnapshot) -> Self {
        match snapshot.status {
            RetryStatus::Idle if snapshot.attempt_number == 0 && snapshot.last_error.is_none() => {
                Self::enabled("Retry".to_string())
            }
            RetryStatus::Idle => Self::enabled(try_again_label(snapshot)),
            RetryStatus::Loading => Self {
                label: "Retrying…".to_string(),
                disabled: true,
                show_spinner: true,
                countdown_secs: None,
            },
            RetryStatus::Cooldown => {
                let secs = ceil_secs(snapshot.cooldown_remaining);
                Self {
                    label: format!("Retry in {secs}s"),
                    disabled: true,
                    show_spinner: false,
                    countdown_secs: Some(secs),
                }
            }
            RetryStatus::Error => Self {
                label: try_again_label(snapshot),
                disabled: true,
                show_spinner: false,
                countdown_secs: None,
            },
            RetryStatus::MaxAttemptsReached => Self {
                label: "Max attempts reached".to_string(),
                disabled: true,
                show_spinner: false,
                countdown_secs: None,
            },
        }
    }

    fn enabled(label: String) -> Self {
        Self {
            label,
            disabled: false,
            show_spinner: false,
            countdown_secs: None,
        }
    }
}

impl From<&RetrySnapshot> for RetryView {
    fn from(snapshot: &RetrySnapshot) -> Self {
        Self::from_snapshot(snapshot)
    }
}

impl std::fmt::Display for RetryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

fn try_again_label(snapshot: &RetrySnapshot) -> String {
    let next = snapshot
        .attempt_number
        .saturating_add(1)
        .min(snapshot.max_attempts);
    format!(
        "Try again (attempt {next} of {})",
        snapshot.max_attempts
    )
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
