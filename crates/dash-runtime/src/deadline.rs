//! Time budgets and cancellation for suspension points.

use std::future::Future;
use std::time::Duration;

use dash_core::error::{DashError, Result};
use tokio_util::sync::CancellationToken;

/// Run `fut` under `limit`, failing with [`DashError::Timeout`] named after
/// `operation` when the budget is spent.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DashError::Timeout {
            operation: operation.to_string(),
            secs: limit.as_secs(),
        }),
    }
}

/// Like [`with_timeout`], but also aborts with [`DashError::Cancelled`] as
/// soon as `cancel` fires. A token that is already cancelled wins.
pub async fn guarded<T, F>(
    cancel: &CancellationToken,
    limit: Duration,
    operation: &str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DashError::Cancelled(operation.to_string())),
        result = with_timeout(limit, operation, fut) => result,
    }
}
