//! The caller-supplied action
//!
//! The controller knows nothing about the action beyond "resolves" or
//! "fails". A panic while building or polling the future counts as a failure.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::ActionError;

/// A fallible async operation with no meaningful success payload.
pub trait RetryAction: Send + Sync {
    fn invoke(&self) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<F, Fut> RetryAction for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn invoke(&self) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(self())
    }
}

/// Run the action once, folding both error paths into [`ActionError`].
pub(crate) async fn run_action(action: Arc<dyn RetryAction>) -> Result<(), ActionError> {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| action.invoke())) {
        Ok(future) => future,
        Err(payload) => return Err(ActionError::panicked(payload)),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(ActionError::from(err)),
        Err(payload) => Err(ActionError::panicked(payload)),
    }
}
