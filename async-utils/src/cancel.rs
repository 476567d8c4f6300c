use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Returned when the token fires before the raced future settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelErr {
    Cancelled,
}

/// Race a future against a `CancellationToken`.
///
/// The controller wraps every action invocation in `or_cancel` so a teardown
/// drops the in-flight future instead of letting it report back later.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// `Ok(output)` if the future wins, `Err(CancelErr::Cancelled)` if the
    /// token is (or already was) cancelled first.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }
}

/// Sleep for `duration` unless the token fires first.
///
/// A zero duration returns immediately without yielding, even if the token
/// is already cancelled.
pub async fn sleep_or_cancel(
    duration: Duration,
    token: &CancellationToken,
) -> Result<(), CancelErr> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::time::sleep(duration).or_cancel(token).await
}
