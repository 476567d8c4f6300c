//! Async retry controller
//!
//! Drives [`RetryState`] from action settlements and cooldown ticks.
//!
//! Locking: one mutex guards the state machine, the current epoch token and
//! the cooldown timer. It is never held across an `.await` or while
//! listeners run, so listeners may call back into the controller.
//!
//! Cancellation: every invocation and every cooldown timer carries an epoch
//! stamp and runs under a child of the current epoch token. Reset advances
//! the epoch and cancels the token. Teardown cancels the root token.
//! Stale results and ticks are dropped without touching state.

mod state;

pub use state::NextStep;

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use retrykit_async_utils::{Epoch, EpochStamp, OrCancelExt, ScheduledTask};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::action::{RetryAction, run_action};
use crate::error::Result;
use crate::events::{ListenerSet, RetryEvent, RetryListener};
use crate::options::ControllerConfig;
use crate::timing::AttemptTimer;
use crate::types::RetrySnapshot;
use state::{RetryState, SetAttempt};

/// What a call to `trigger` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Not idle (loading, cooling down, exhausted) or torn down; the action
    /// was not invoked.
    Ignored,
    /// The action ran but a reset or teardown overtook it; its result was
    /// dropped.
    Discarded,
    /// The action settled and the state machine moved on.
    Settled(NextStep),
}

struct Inner {
    machine: RetryState,
    /// Cancelled on reset; parent of the in-flight attempt and the timer.
    epoch_token: CancellationToken,
    cooldown_timer: Option<ScheduledTask>,
}

struct Shared {
    inner: Mutex<Inner>,
    epoch: Epoch,
    teardown: CancellationToken,
    action: Arc<dyn RetryAction>,
    listeners: ListenerSet,
    snapshots: watch::Sender<RetrySnapshot>,
    auto_retry: bool,
    tick_interval: Duration,
}

/// Owns one retry state machine and the action it guards.
///
/// Dropping the controller tears it down: the cooldown timer stops, any
/// in-flight attempt is abandoned and no listener fires again.
pub struct RetryController {
    shared: Arc<Shared>,
}

/// Non-owning handle for listeners and background tasks.
///
/// Operations on a handle whose controller is gone are no-ops.
#[derive(Clone)]
pub struct RetryHandle {
    shared: Weak<Shared>,
}

impl std::fmt::Debug for RetryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryController")
            .field("snapshot", &*self.shared.snapshots.borrow())
            .field("listeners", &self.shared.listeners)
            .field("auto_retry", &self.shared.auto_retry)
            .finish()
    }
}

impl RetryController {
    /// Fails fast on an invalid configuration.
    pub fn new<A>(config: ControllerConfig, action: A) -> Result<Self>
    where
        A: RetryAction + 'static,
    {
        Self::from_arc(config, Arc::new(action))
    }

    pub fn from_arc(config: ControllerConfig, action: Arc<dyn RetryAction>) -> Result<Self> {
        config.validate()?;
        let machine = RetryState::new(&config);
        let (snapshots, _) = watch::channel(machine.snapshot());
        let teardown = CancellationToken::new();
        let shared = Shared {
            inner: Mutex::new(Inner {
                machine,
                epoch_token: teardown.child_token(),
                cooldown_timer: None,
            }),
            epoch: Epoch::new(),
            teardown,
            action,
            listeners: ListenerSet::new(),
            snapshots,
            auto_retry: config.auto_retry,
            tick_interval: config.tick_interval,
        };
        tracing::debug!(
            max_attempts = config.max_attempts(),
            strategy = %config.strategy.kind(),
            cooldown_ms = config.cooldown.as_millis() as u64,
            controlled = config.counting.is_controlled(),
            "retry controller created"
        );
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn with_listener<L>(self, listener: L) -> Self
    where
        L: RetryListener + 'static,
    {
        self.add_listener(Arc::new(listener));
        self
    }

    pub fn add_listener(&self, listener: Arc<dyn RetryListener>) {
        self.shared.listeners.add(listener);
    }

    /// Invoke the action if idle and wait for it to settle.
    ///
    /// Action failures are reported through state and events, not as an
    /// error here.
    pub async fn trigger(&self) -> TriggerOutcome {
        Arc::clone(&self.shared).trigger().await
    }

    /// Return to idle with the counter at zero, abandoning any in-flight
    /// attempt and cooldown.
    pub fn reset(&self) {
        self.shared.reset();
    }

    /// Update the caller-owned counter. Only valid in controlled mode.
    pub fn set_current_attempt(&self, attempt: u32) -> Result<()> {
        self.shared.set_current_attempt(attempt)
    }

    pub fn snapshot(&self) -> RetrySnapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Receiver updated on every state change.
    pub fn subscribe(&self) -> watch::Receiver<RetrySnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn handle(&self) -> RetryHandle {
        RetryHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Stop everything. Idempotent; also runs on drop.
    pub fn teardown(&self) {
        self.shared.teardown();
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.teardown.is_cancelled()
    }
}

impl Drop for RetryController {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

impl RetryHandle {
    pub async fn trigger(&self) -> TriggerOutcome {
        match self.shared.upgrade() {
            Some(shared) => shared.trigger().await,
            None => TriggerOutcome::Ignored,
        }
    }

    pub fn reset(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.reset();
        }
    }

    pub fn set_current_attempt(&self, attempt: u32) -> Result<()> {
        match self.shared.upgrade() {
            Some(shared) => shared.set_current_attempt(attempt),
            None => Ok(()),
        }
    }

    pub fn snapshot(&self) -> Option<RetrySnapshot> {
        self.shared
            .upgrade()
            .map(|shared| shared.snapshots.borrow().clone())
    }
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, machine: &RetryState) {
        self.snapshots.send_replace(machine.snapshot());
    }

    fn dispatch(&self, events: &[RetryEvent]) {
        if self.teardown.is_cancelled() {
            return;
        }
        self.listeners.dispatch(events);
    }

    /// Boxed so the auto-retry paths can spawn it from inside itself.
    fn trigger(self: Arc<Self>) -> BoxFuture<'static, TriggerOutcome> {
        async move {
            if self.teardown.is_cancelled() {
                return TriggerOutcome::Ignored;
            }

            let (stamp, attempt_number, attempt_token, events) = {
                let mut inner = self.lock_inner();
                let Some((attempt_number, events)) = inner.machine.begin_attempt() else {
                    tracing::debug!(
                        status = inner.machine.status().as_str(),
                        "trigger ignored"
                    );
                    return TriggerOutcome::Ignored;
                };
                self.publish(&inner.machine);
                (
                    self.epoch.stamp(),
                    attempt_number,
                    inner.epoch_token.child_token(),
                    events,
                )
            };
            self.dispatch(&events);

            let timer = AttemptTimer::start(attempt_number);
            let result = run_action(Arc::clone(&self.action))
                .or_cancel(&attempt_token)
                .await;
            let duration = timer.finish();
            let Ok(outcome) = result else {
                tracing::debug!(attempt_number, "attempt abandoned by reset or teardown");
                return TriggerOutcome::Discarded;
            };

            let (next, events) = {
                let mut inner = self.lock_inner();
                if self.teardown.is_cancelled() || !self.epoch.is_current(stamp) {
                    tracing::debug!(attempt_number, "discarding result of stale attempt");
                    return TriggerOutcome::Discarded;
                }
                let (next, events) = inner.machine.settle(attempt_number, outcome, duration);
                if let NextStep::Cooldown(delay) = next {
                    let timer = self.cooldown_timer(stamp, inner.epoch_token.child_token(), delay);
                    inner.cooldown_timer = Some(timer);
                }
                self.publish(&inner.machine);
                (next, events)
            };
            self.dispatch(&events);

            if next == NextStep::Ready && self.auto_retry {
                self.spawn_retry();
            }
            TriggerOutcome::Settled(next)
        }
        .boxed()
    }

    fn cooldown_timer(
        self: &Arc<Self>,
        stamp: EpochStamp,
        token: CancellationToken,
        delay: Duration,
    ) -> ScheduledTask {
        let weak = Arc::downgrade(self);
        let first = self.tick_interval.min(delay);
        ScheduledTask::spawn(&self.epoch, stamp, token, first, move |elapsed| {
            let weak = Weak::clone(&weak);
            async move {
                match weak.upgrade() {
                    Some(shared) => shared.on_cooldown_tick(stamp, elapsed),
                    None => ControlFlow::Break(()),
                }
            }
        })
    }

    /// Counts down by the measured `elapsed`. Continues with the sleep until
    /// the next tick, never past the end of the cooldown.
    fn on_cooldown_tick(
        self: &Arc<Self>,
        stamp: EpochStamp,
        elapsed: Duration,
    ) -> ControlFlow<(), Duration> {
        let (events, finished, next_sleep, retry) = {
            let mut inner = self.lock_inner();
            if self.teardown.is_cancelled() || !self.epoch.is_current(stamp) {
                return ControlFlow::Break(());
            }
            let (events, finished) = inner.machine.tick(elapsed);
            if finished {
                inner.cooldown_timer = None;
            }
            self.publish(&inner.machine);
            let next_sleep = self.tick_interval.min(inner.machine.cooldown_remaining());
            let retry = finished && !events.is_empty() && inner.machine.status().accepts_trigger();
            (events, finished, next_sleep, retry)
        };
        self.dispatch(&events);

        if !finished {
            return ControlFlow::Continue(next_sleep);
        }
        if self.auto_retry && retry {
            self.spawn_retry();
        }
        ControlFlow::Break(())
    }

    fn spawn_retry(self: &Arc<Self>) {
        if self.teardown.is_cancelled() {
            return;
        }
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = shared.trigger().await;
            tracing::trace!(?outcome, "automatic retry finished");
        });
    }

    /// Advance the epoch and cancel everything scheduled under the old one.
    fn invalidate(&self, inner: &mut Inner) {
        self.epoch.advance();
        inner.epoch_token.cancel();
        inner.epoch_token = self.teardown.child_token();
        inner.cooldown_timer = None;
    }

    fn reset(&self) {
        let events = {
            let mut inner = self.lock_inner();
            self.invalidate(&mut inner);
            let events = inner.machine.reset();
            self.publish(&inner.machine);
            events
        };
        tracing::debug!("retry controller reset");
        self.dispatch(&events);
    }

    fn set_current_attempt(&self, attempt: u32) -> Result<()> {
        let events = {
            let mut inner = self.lock_inner();
            let events = match inner.machine.set_current_attempt(attempt)? {
                SetAttempt::Reset(events) => {
                    self.invalidate(&mut inner);
                    events
                }
                SetAttempt::Updated(events) => events,
            };
            self.publish(&inner.machine);
            events
        };
        self.dispatch(&events);
        Ok(())
    }

    fn teardown(&self) {
        if self.teardown.is_cancelled() {
            return;
        }
        self.epoch.advance();
        self.teardown.cancel();
        tracing::debug!("retry controller torn down");
    }
}
