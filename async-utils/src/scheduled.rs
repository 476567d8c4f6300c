use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cancel::sleep_or_cancel;
use crate::epoch::{Epoch, EpochStamp};

/// A background task bound to an epoch stamp that wakes on a schedule the
/// callback chooses.
///
/// The task sleeps for `first`, then checks its stamp against the epoch and
/// runs the tick callback with the time measured since the previous wake.
/// `ControlFlow::Continue(next)` sleeps for `next` before the following tick.
/// It stops when:
/// - its token (or any parent token) is cancelled,
/// - the epoch has advanced past its stamp,
/// - the callback returns `ControlFlow::Break`.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn onto the current tokio runtime.
    pub fn spawn<F, Fut>(
        epoch: &Epoch,
        stamp: EpochStamp,
        token: CancellationToken,
        first: Duration,
        mut tick: F,
    ) -> Self
    where
        F: FnMut(Duration) -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<(), Duration>> + Send + 'static,
    {
        let epoch = epoch.clone();
        let task_token = token.clone();
        let mut last_wake = Instant::now();
        let handle = tokio::spawn(async move {
            let mut next = first;
            loop {
                if sleep_or_cancel(next, &task_token).await.is_err() {
                    tracing::trace!(stamp = stamp.value(), "scheduled task cancelled");
                    break;
                }
                if task_token.is_cancelled() {
                    break;
                }
                if !epoch.is_current(stamp) {
                    tracing::debug!(
                        stamp = stamp.value(),
                        current = epoch.stamp().value(),
                        "dropping stale scheduled task"
                    );
                    break;
                }
                let now = Instant::now();
                let elapsed = now.duration_since(last_wake);
                last_wake = now;
                match tick(elapsed).await {
                    ControlFlow::Continue(delay) => next = delay,
                    ControlFlow::Break(()) => break,
                }
            }
        });

        Self { token, handle }
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(
        epoch: &Epoch,
        token: CancellationToken,
        stop_after: usize,
    ) -> (ScheduledTask, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let period = Duration::from_millis(100);
        let task = ScheduledTask::spawn(epoch, epoch.stamp(), token, period, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if seen >= stop_after {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(period)
                }
            }
        });
        (task, ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_callback_breaks() {
        let epoch = Epoch::new();
        let (task, ticks) = counting_task(&epoch, CancellationToken::new(), 3);

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(3, ticks.load(Ordering::SeqCst));
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_stamp_stops_before_next_tick() {
        let epoch = Epoch::new();
        let (task, ticks) = counting_task(&epoch, CancellationToken::new(), usize::MAX);

        tokio::time::sleep(Duration::from_millis(250)).await;
        epoch.advance();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(2, ticks.load(Ordering::SeqCst));
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_child_task() {
        let epoch = Epoch::new();
        let parent = CancellationToken::new();
        let (task, ticks) = counting_task(&epoch, parent.child_token(), usize::MAX);

        tokio::time::sleep(Duration::from_millis(150)).await;
        parent.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(1, ticks.load(Ordering::SeqCst));
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_task() {
        let epoch = Epoch::new();
        let (task, ticks) = counting_task(&epoch, CancellationToken::new(), usize::MAX);

        drop(task);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(0, ticks.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn callback_sees_measured_elapsed_and_picks_next_sleep() {
        let epoch = Epoch::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let mut sleeps = vec![Duration::from_millis(50), Duration::from_millis(30)].into_iter();
        let task = ScheduledTask::spawn(
            &epoch,
            epoch.stamp(),
            CancellationToken::new(),
            Duration::from_millis(100),
            move |elapsed| {
                record.lock().unwrap().push(elapsed);
                let next = sleeps.next();
                async move {
                    match next {
                        Some(delay) => ControlFlow::Continue(delay),
                        None => ControlFlow::Break(()),
                    }
                }
            },
        );

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(
            vec![
                Duration::from_millis(100),
                Duration::from_millis(50),
                Duration::from_millis(30),
            ],
            *seen.lock().unwrap()
        );
        assert!(task.is_finished());
    }
}
