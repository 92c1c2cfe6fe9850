//! Cancellation for remote calls.

use crate::{Error, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Race `fut` against `cancel`. A fired token wins, even when the future is
/// also ready, and yields [`Error::Cancelled`].
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}
