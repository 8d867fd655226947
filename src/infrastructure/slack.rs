//! Slack incoming webhook

use async_trait::async_trait;

use super::http::{failure, HttpClient};
use crate::domain::slack::Message;
use crate::error::ServiceError;

const SLACK: &str = "Slack";

/// Chat channel the build summary is posted to
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn post(&self, message: &Message) -> Result<(), ServiceError>;
}

/// Posts Block Kit messages to a webhook URL. The URL is a credential.
pub struct SlackWebhook {
    http: HttpClient,
    webhook_url: String,
}

impl SlackWebhook {
    pub fn new(http: HttpClient, webhook_url: impl Into<String>) -> Self {
        Self {
            http,
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl ChatClient for SlackWebhook {
    async fn post(&self, message: &Message) -> Result<(), ServiceError> {
        let response = self
            .http
            .send(self.http.inner().post(&self.webhook_url).json(message))
            .await
            .map_err(|source| ServiceError::Transport {
                service: SLACK,
                source: source.without_url(),
            })?;

        if !response.status().is_success() {
            let (status, body) = failure(response).await;
            return Err(ServiceError::Http {
                service: SLACK,
                status,
                body,
            });
        }
        Ok(())
    }
}
