//! Retry controller for a single fallible async action.
//!
//! Wraps the action with bounded re-invocation, a cooldown between attempts
//! whose length comes from a backoff strategy, and attempt accounting that is
//! either owned by the controller or supplied by the caller.
//!
//! This crate has no UI. Callers render [`RetrySnapshot`] (or the derived
//! [`RetryView`]) and observe transitions through [`RetryListener`]s.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod action;
pub mod backoff;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod options;
pub mod timing;
pub mod types;
pub mod view;

pub use action::RetryAction;
pub use backoff::{BackoffStrategy, MAX_BACKOFF, StrategyKind};
pub use controller::{NextStep, RetryController, RetryHandle, TriggerOutcome};
pub use error::{ActionError, ControllerError, Result};
pub use events::{
    AnalyticsEvent, AnalyticsKind, ListenerSet, RetryEvent, RetryListener, TracingListener,
};
pub use options::{AttemptCounting, ControllerConfig};
pub use types::{RetryAttempt, RetrySnapshot, RetryStatus};
pub use view::RetryView;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
