//! Text rendering of controller events

use retrykit_controller::{RetryEvent, RetrySnapshot, RetryView};

/// One output line for `event`, given the state right after it fired.
///
/// Analytics and sub-second countdown ticks render nothing.
pub fn render_event(event: &RetryEvent, snapshot: &RetrySnapshot) -> Option<String> {
    let view = RetryView::from_snapshot(snapshot);
    match event {
        RetryEvent::BeforeRetry { attempt_number } => Some(format!(
            "{} attempt {attempt_number} of {}",
            view.label, snapshot.max_attempts
        )),
        RetryEvent::AfterRetry(attempt) => Some(match &attempt.error {
            None => format!(
                "attempt {} succeeded in {}ms",
                attempt.attempt_number,
                attempt.duration.as_millis()
            ),
            Some(err) => format!("attempt {} failed: {err}", attempt.attempt_number),
        }),
        RetryEvent::CooldownStart { duration } => Some(format!(
            "Retry in {}s (backoff {}ms)",
            duration.as_millis().div_ceil(1000),
            duration.as_millis()
        )),
        RetryEvent::CooldownTick { remaining } if remaining.subsec_nanos() == 0 => {
            Some(view.label)
        }
        RetryEvent::CooldownTick { .. } => None,
        RetryEvent::CooldownEnd => Some(view.label),
        RetryEvent::MaxAttemptsReached { .. } => Some("Max attempts reached".to_string()),
        RetryEvent::Analytics(_) => None,
    }
}
