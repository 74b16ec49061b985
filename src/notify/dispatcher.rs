//! Event bus subscriber that turns domain events into notifications.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{ChatAlerter, EmailMessage, Mailer};
use crate::domain::DirectoryEvent;

/// What to send for one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    /// Email to a submitter or sponsor.
    pub email: Option<EmailMessage>,
    /// Operator alert text.
    pub alert: Option<String>,
}

/// Sends emails and alerts for [`DirectoryEvent`]s. Never fails.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    alerter: Arc<dyn ChatAlerter>,
    public_base_url: String,
}

impl NotificationDispatcher {
    /// Creates a dispatcher. `public_base_url` is used to build links.
    #[must_use]
    pub fn new(
        mailer: Arc<dyn Mailer>,
        alerter: Arc<dyn ChatAlerter>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            alerter,
            public_base_url: public_base_url.into(),
        }
    }

    /// Runs [`Self::run`] on a background task.
    pub fn spawn(self, rx: broadcast::Receiver<DirectoryEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Handles events until the bus closes.
    pub async fn run(self, mut rx: broadcast::Receiver<DirectoryEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.handle(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "notification dispatcher lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("notification dispatcher stopped");
    }

    /// Delivers the notification for one event, logging failures.
    pub async fn handle(&self, event: &DirectoryEvent) {
        let kind = event.event_type_str();
        let Notification { email, alert } = self.compose(event);
        if let Some(message) = email
            && let Err(e) = self.mailer.send(&message).await
        {
            tracing::warn!(event_type = kind, to = %message.to, error = %e, "email delivery failed");
        }
        if let Some(text) = alert
            && let Err(e) = self.alerter.alert(&text).await
        {
            tracing::warn!(event_type = kind, error = %e, "chat alert failed");
        }
    }

    /// Builds the messages for an event without sending them.
    #[must_use]
    pub fn compose(&self, event: &DirectoryEvent) -> Notification {
        match event {
            DirectoryEvent::SubmissionApproved {
                tool_slug,
                tool_name,
                email,
                tier,
                ..
            } => Notification {
                email: Some(EmailMessage {
                    to: email.clone(),
                    subject: format!("{tool_name} is now listed on VibeStack"),
                    text: format!(
                        "Good news! Your {tier} submission {tool_name} was approved.\n\n\
                         View the listing: {}/tools/{tool_slug}\n",
                        self.public_base_url
                    ),
                }),
                alert: None,
            },
            DirectoryEvent::SubmissionPaymentFailed {
                submission_id,
                tool_name,
                email,
                reason,
                ..
            } => {
                let reason = reason.as_deref().unwrap_or("the payment was declined");
                Notification {
                    email: Some(EmailMessage {
                        to: email.clone(),
                        subject: format!("Payment for {tool_name} did not go through"),
                        text: format!(
                            "We could not complete the payment for your submission \
                             {tool_name}: {reason}.\n\nYou can submit again at {}/submit\n",
                            self.public_base_url
                        ),
                    }),
                    alert: Some(format!(
                        ":warning: Submission payment failed for {tool_name} \
                         ({submission_id}): {reason}"
                    )),
                }
            }
            DirectoryEvent::SponsorshipActivated {
                sponsorship_id,
                placement,
                sponsor_name,
                sponsor_email,
                current_period_end,
                ..
            } => {
                let sponsor = sponsor_name.as_deref().unwrap_or("A sponsor");
                let until = current_period_end
                    .map(|end| end.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "the end of the billing period".to_string());
                Notification {
                    email: sponsor_email.as_ref().map(|to| EmailMessage {
                        to: to.clone(),
                        subject: "Your VibeStack sponsorship is live".to_string(),
                        text: format!(
                            "Thanks for sponsoring VibeStack. Your {placement} placement \
                             runs until {until}.\n"
                        ),
                    }),
                    alert: Some(format!(
                        ":tada: {sponsor} activated a {placement} sponsorship \
                         ({sponsorship_id}) until {until}"
                    )),
                }
            }
            DirectoryEvent::WebhookFailed {
                event_id,
                event_type,
                error,
                ..
            } => Notification {
                email: None,
                alert: Some(format!(
                    ":rotating_light: Webhook {event_type} ({event_id}) failed: {error}"
                )),
            },
        }
    }
}
