//! Bounded deadlines for remote calls.

use grouper_core::error::PlatformError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `fut`, failing with `DEADLINE_EXCEEDED` if it takes longer than `limit`.
///
/// The in-flight call is dropped on expiry; the remote side may still finish it.
pub(crate) async fn with_deadline<T, E, F>(limit: Duration, operation: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<PlatformError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{operation} exceeded its {}s deadline", limit.as_secs_f32());
            Err(PlatformError::deadline_exceeded(operation).into())
        }
    }
}
