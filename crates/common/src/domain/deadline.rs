use crate::domain::{DomainError, DomainResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run a repository call under a deadline, surfacing `TransportError` on expiry
pub async fn with_deadline<T, F>(timeout: Duration, operation: &str, call: F) -> DomainResult<T>
where
    F: Future<Output = DomainResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation = %operation, timeout_ms = timeout.as_millis() as u64, "repository call timed out");
            Err(DomainError::TransportError(format!(
                "{} timed out after {}ms",
                operation,
                timeout.as_millis()
            )))
        }
    }
}
