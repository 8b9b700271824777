use crate::domain::{DomainError, DomainResult, NotificationDispatcher, NotificationMessage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// JSON body posted to the webhook endpoint
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Delivers notifications by POSTing them to an HTTP endpoint (mail relay,
/// SMS gateway, ...). Any non-2xx answer is a `TransportError`.
#[derive(Clone)]
pub struct WebhookNotificationDispatcher {
    client: Client,
    url: String,
}

impl WebhookNotificationDispatcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotificationDispatcher {
    #[instrument(skip(self, message), fields(address = %message.address))]
    async fn send(&self, message: NotificationMessage) -> DomainResult<()> {
        let payload = WebhookPayload {
            to: &message.address,
            subject: &message.subject,
            body: &message.body,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DomainError::TransportError(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::TransportError(format!(
                "webhook returned {}",
                status
            )));
        }

        debug!(status = status.as_u16(), "webhook accepted notification");
        Ok(())
    }
}
