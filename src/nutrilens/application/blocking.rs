use super::error::ApplicationError;
use crate::domain::error::BackendError;
use std::future::Future;
use std::time::Duration;

/// Runs CPU-heavy work (decoding, cropping, encoding) on tokio's blocking pool.
pub(crate) async fn run_blocking<T, E, F>(work: F) -> Result<T, ApplicationError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApplicationError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApplicationError::ScanFailed(format!("background task failed: {}", e)))?
        .map_err(Into::into)
}

/// A missing answer within `limit` counts as a network failure. The inner
/// future is dropped on expiry, which cancels any request it was driving.
pub(crate) async fn within<T, F>(limit: Option<Duration>, future: F) -> Result<T, ApplicationError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| BackendError::Network(format!("no response within {:?}", limit)))?,
        None => future.await,
    };
    Ok(result?)
}
