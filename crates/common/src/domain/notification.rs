use crate::domain::result::DomainResult;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// Outbound message to a parcel participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub address: String,
    pub subject: String,
    pub body: String,
}

/// Sends messages to participants. Implementations report failures as
/// `DomainError::TransportError` and never panic across the boundary.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, message: NotificationMessage) -> DomainResult<()>;
}

/// Dispatcher that only records messages in the log
#[derive(Debug, Clone, Default)]
pub struct LogNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LogNotificationDispatcher {
    async fn send(&self, message: NotificationMessage) -> DomainResult<()> {
        info!(address = %message.address, subject = %message.subject, "notification dispatched");
        Ok(())
    }
}

/// Send and swallow the outcome. Failures and timeouts are logged; the
/// returned flag tells the caller whether the message went out.
pub async fn dispatch_best_effort(
    dispatcher: &dyn NotificationDispatcher,
    message: NotificationMessage,
    timeout: Duration,
) -> bool {
    let address = message.address.clone();
    let subject = message.subject.clone();

    match tokio::time::timeout(timeout, dispatcher.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(address = %address, subject = %subject, error = %e, "notification failed");
            false
        }
        Err(_) => {
            warn!(address = %address, subject = %subject, timeout_ms = timeout.as_millis() as u64, "notification timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    fn message() -> NotificationMessage {
        NotificationMessage {
            address: "recipient@example.com".to_string(),
            subject: "Your delivery code".to_string(),
            body: "123456".to_string(),
        }
    }

    #[tokio::test]
    async fn test_best_effort_reports_success() {
        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher.expect_send().times(1).returning(|_| Ok(()));

        assert!(dispatch_best_effort(&dispatcher, message(), Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failure() {
        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher
            .expect_send()
            .times(1)
            .returning(|_| Err(DomainError::TransportError("smtp down".to_string())));

        assert!(!dispatch_best_effort(&dispatcher, message(), Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_log_dispatcher_always_succeeds() {
        let dispatcher = LogNotificationDispatcher;
        assert!(dispatcher.send(message()).await.is_ok());
    }
}
