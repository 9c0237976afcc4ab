use crate::utils::error::Result;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Runs `operation`, retrying exactly once after `backoff` if the first
/// failure is transient.
pub async fn retry_once<T, F, Fut>(label: &str, backoff: Duration, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            tracing::warn!("⏳ {} failed ({}), retrying once in {:?}", label, e, backoff);
            tokio::time::sleep(backoff).await;
            operation().await
        }
        Err(e) => Err(e),
    }
}
