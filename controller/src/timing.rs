//! Attempt timing
//!
//! Uses `tokio::time::Instant` so durations follow the runtime clock, which
//! keeps them deterministic under a paused test clock.

use std::time::Duration;
use tokio::time::Instant;

/// Measures one action invocation.
#[derive(Debug)]
pub struct AttemptTimer {
    attempt_number: u32,
    start: Instant,
}

impl AttemptTimer {
    pub fn start(attempt_number: u32) -> Self {
        Self {
            attempt_number,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer, log, and return the elapsed duration.
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!(
            attempt_number = self.attempt_number,
            elapsed_ms = elapsed.as_millis() as u64,
            "action settled"
        );
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn finish_reports_runtime_elapsed_time() {
        let timer = AttemptTimer::start(1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(Duration::from_millis(1500), timer.finish());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_can_be_read_repeatedly() {
        let timer = AttemptTimer::start(2);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let first = timer.elapsed();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(timer.elapsed() > first);
    }
}
