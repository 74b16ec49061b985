//! Operator alerts through a Slack incoming webhook.

use std::time::Duration;

use async_trait::async_trait;

use super::{ChatAlerter, NotifyError, check_response};

/// [`ChatAlerter`] that posts to a Slack incoming-webhook URL.
#[derive(Debug, Clone)]
pub struct SlackAlerter {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackAlerter {
    /// Creates an alerter for the given webhook URL.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Transport`] if the HTTP client cannot be built.
    pub fn new(webhook_url: String) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl ChatAlerter for SlackAlerter {
    async fn alert(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        check_response(response).await
    }
}

/// [`ChatAlerter`] that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlerter;

#[async_trait]
impl ChatAlerter for LogAlerter {
    async fn alert(&self, text: &str) -> Result<(), NotifyError> {
        tracing::info!(alert = text, "chat alert (not sent, no webhook)");
        Ok(())
    }
}
