//! Cancellable suspension points.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Sleeps for `duration` unless `cancel` fires first.
pub async fn sleep(cancel: &CancellationToken, duration: Duration) -> Result<(), Cancelled> {
	guard(cancel, tokio::time::sleep(duration)).await
}

/// Runs `fut` to completion unless `cancel` fires first.
pub async fn guard<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, Cancelled> {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Cancelled),
		out = fut => Ok(out),
	}
}
