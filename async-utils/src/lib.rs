//! Async utilities for cancellation-aware futures and epoch-tagged timers.
//!
//! - `OrCancelExt` races a future against a `CancellationToken`.
//! - `Epoch` hands out stamps that go stale once the epoch advances.
//! - `ScheduledTask` runs a self-rescheduling callback until it is cancelled, its
//!   stamp goes stale, or the callback asks to stop.

mod cancel;
mod epoch;
mod scheduled;

pub use cancel::{CancelErr, OrCancelExt, sleep_or_cancel};
pub use epoch::{Epoch, EpochStamp};
pub use scheduled::ScheduledTask;
