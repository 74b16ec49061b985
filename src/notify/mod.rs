//! Outbound notifications: transactional email and chat alerts.
//!
//! Delivery is best-effort. The [`dispatcher::NotificationDispatcher`]
//! listens on the event bus and every failure stops at a `warn` log; no
//! caller ever sees a notification error.

pub mod dispatcher;
pub mod email;
pub mod slack;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::NotificationSettings;

pub use dispatcher::{Notification, NotificationDispatcher};
pub use email::{LogMailer, ResendMailer};
pub use slack::{LogAlerter, SlackAlerter};

/// Failure delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The request never produced a response.
    #[error("notification transport failed: {0}")]
    Transport(String),

    /// The remote service refused the message.
    #[error("notification rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// A plain-text transactional email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
}

/// Sends transactional email.
#[async_trait]
pub trait Mailer: Send + Sync + fmt::Debug {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] if the message was not accepted.
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Posts operator alerts to a chat channel.
#[async_trait]
pub trait ChatAlerter: Send + Sync + fmt::Debug {
    /// Posts one alert.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] if the alert was not accepted.
    async fn alert(&self, text: &str) -> Result<(), NotifyError>;
}

const MAX_ERROR_BODY: usize = 512;

/// Turns a non-success response into [`NotifyError::Rejected`].
async fn check_response(response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    Err(NotifyError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Picks the mailer and alerter for the configured credentials, falling
/// back to log-only implementations when a credential is absent.
///
/// # Errors
///
/// Returns [`NotifyError::Transport`] if an HTTP client cannot be built.
pub fn from_settings(
    settings: &NotificationSettings,
) -> Result<(Arc<dyn Mailer>, Arc<dyn ChatAlerter>), NotifyError> {
    let mailer: Arc<dyn Mailer> = match &settings.resend_api_key {
        Some(key) => Arc::new(ResendMailer::new(key.clone(), settings.email_from.clone())?),
        None => {
            tracing::info!("RESEND_API_KEY not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };
    let alerter: Arc<dyn ChatAlerter> = match &settings.slack_webhook_url {
        Some(url) => Arc::new(SlackAlerter::new(url.clone())?),
        None => {
            tracing::info!("SLACK_WEBHOOK_URL not set, alerts will only be logged");
            Arc::new(LogAlerter)
        }
    };
    Ok((mailer, alerter))
}
