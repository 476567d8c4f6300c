//! Lifecycle events and listener dispatch
//!
//! Every transition produces a list of [`RetryEvent`]s; the controller hands
//! them to a [`ListenerSet`] after releasing its state lock, so listeners may
//! call back into the controller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::types::RetryAttempt;

/// Everything a caller can observe about the controller.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// Fired immediately before the action is invoked.
    BeforeRetry { attempt_number: u32 },
    /// Fired once the action settles, success or failure.
    AfterRetry(RetryAttempt),
    CooldownStart { duration: Duration },
    CooldownTick { remaining: Duration },
    CooldownEnd,
    /// Fired once per arrival in the terminal state.
    MaxAttemptsReached { attempt_number: u32 },
    /// Telemetry record for every observable transition.
    Analytics(AnalyticsEvent),
}

impl RetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RetryEvent::BeforeRetry { .. } => "before_retry",
            RetryEvent::AfterRetry(_) => "after_retry",
            RetryEvent::CooldownStart { .. } => "cooldown_start",
            RetryEvent::CooldownTick { .. } => "cooldown_tick",
            RetryEvent::CooldownEnd => "cooldown_end",
            RetryEvent::MaxAttemptsReached { .. } => "max_attempts_reached",
            RetryEvent::Analytics(_) => "analytics",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsKind {
    AttemptStarted,
    AttemptSucceeded,
    AttemptFailed,
    CooldownStarted,
    CooldownEnded,
    MaxAttemptsReached,
    Reset,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    #[serde(rename = "type")]
    pub kind: AnalyticsKind,
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(kind: AnalyticsKind, attempt_number: u32, max_attempts: u32) -> Self {
        Self {
            kind,
            attempt_number,
            max_attempts,
            timestamp: Utc::now(),
        }
    }
}

/// Observer of controller events.
///
/// Implemented for any `Fn(&RetryEvent)`, so closures can be registered
/// directly.
pub trait RetryListener: Send + Sync {
    fn on_event(&self, event: &RetryEvent);
}

impl<F> RetryListener for F
where
    F: Fn(&RetryEvent) + Send + Sync,
{
    fn on_event(&self, event: &RetryEvent) {
        self(event)
    }
}

/// Zero or more registered listeners.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn RetryListener>>>,
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn RetryListener>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver each event, in order, to every listener.
    ///
    /// The registration list is copied first so a listener may register
    /// another listener without deadlocking; the newcomer sees the next batch.
    pub fn dispatch(&self, events: &[RetryEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners: Vec<Arc<dyn RetryListener>> = self
            .listeners
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        for event in events {
            for listener in &listeners {
                listener.on_event(event);
            }
        }
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl RetryListener for TracingListener {
    fn on_event(&self, event: &RetryEvent) {
        match event {
            RetryEvent::BeforeRetry { attempt_number } => {
                tracing::info!(attempt_number, "invoking action");
            }
            RetryEvent::AfterRetry(attempt) => match &attempt.error {
                None => tracing::info!(
                    attempt_number = attempt.attempt_number,
                    duration_ms = attempt.duration.as_millis() as u64,
                    "attempt succeeded"
                ),
                Some(err) => tracing::info!(
                    attempt_number = attempt.attempt_number,
                    duration_ms = attempt.duration.as_millis() as u64,
                    error = %err,
                    "attempt failed"
                ),
            },
            RetryEvent::CooldownStart { duration } => {
                tracing::info!(cooldown_ms = duration.as_millis() as u64, "cooldown started");
            }
            RetryEvent::CooldownTick { remaining } => {
                tracing::trace!(remaining_ms = remaining.as_millis() as u64, "cooldown tick");
            }
            RetryEvent::CooldownEnd => tracing::info!("cooldown ended"),
            RetryEvent::MaxAttemptsReached { attempt_number } => {
                tracing::warn!(attempt_number, "max attempts reached");
            }
            RetryEvent::Analytics(analytics) => tracing::debug!(
                kind = ?analytics.kind,
                attempt_number = analytics.attempt_number,
                max_attempts = analytics.max_attempts,
                "analytics"
            ),
        }
    }
}
