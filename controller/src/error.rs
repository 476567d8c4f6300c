//! Error types for the retry controller

use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Controller result type alias
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors returned to the code that builds or drives a controller.
///
/// Action failures never show up here; they are captured as
/// [`ActionError`] and drive the state machine instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    #[error("invalid retry configuration: `{field}` {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("attempt {attempt} is outside 0..={max_attempts}")]
    AttemptOutOfRange { attempt: u32, max_attempts: u32 },

    #[error("attempt counting is not caller-controlled")]
    NotControlled,
}

impl ControllerError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ControllerError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// A captured action failure.
///
/// Cheap to clone so the same value can sit in `last_error`, in a
/// [`RetryAttempt`](crate::RetryAttempt) and in published snapshots.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("{0:#}")]
    Failed(Arc<anyhow::Error>),

    #[error("action panicked: {0}")]
    Panicked(String),
}

impl ActionError {
    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ActionError::Panicked(message)
    }
}

impl From<anyhow::Error> for ActionError {
    fn from(err: anyhow::Error) -> Self {
        ActionError::Failed(Arc::new(err))
    }
}
