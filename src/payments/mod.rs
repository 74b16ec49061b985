//! Payment provider boundary.
//!
//! [`PaymentProvider`] is the seam the checkout and reconciliation services
//! call through; [`stripe::StripeClient`] is the production implementation.
//! Webhook bodies are authenticated by [`signature`] and decoded by
//! [`event`].

pub mod event;
pub mod signature;
pub mod stripe;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

pub use event::{
    CheckoutIntent, CheckoutSessionObject, EventParseError, MetadataError, ProviderEvent,
    ProviderEventKind, SubscriptionSnapshot,
};
pub use signature::{SignatureError, signature_header, verify_signature};
pub use stripe::StripeClient;

/// Failure talking to the payment provider.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// No API key is configured.
    #[error("payment provider not configured")]
    NotConfigured,

    /// The request never produced a response.
    #[error("provider request failed: {0}")]
    Transport(String),

    /// The provider answered with an error status.
    #[error("provider returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider error message.
        message: String,
    },

    /// The provider answered with a body we cannot read.
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Billing mode of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// Recurring subscription (sponsorships).
    Subscription,
    /// One-time payment (paid submissions).
    Payment,
}

impl CheckoutMode {
    /// Provider name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Payment => "payment",
        }
    }
}

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    /// Billing mode.
    pub mode: CheckoutMode,
    /// Provider price id; quantity is always one.
    pub price_id: String,
    /// Email to prefill.
    pub customer_email: Option<String>,
    /// Redirect after payment.
    pub success_url: String,
    /// Redirect on abandonment.
    pub cancel_url: String,
    /// Metadata attached to the session and to the resulting subscription
    /// or payment intent.
    pub metadata: BTreeMap<String, String>,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Session id.
    pub id: String,
    /// Hosted page the customer is redirected to.
    pub url: String,
}

/// Operations the core needs from the payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync + fmt::Debug {
    /// Creates a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] if the provider is unreachable or refuses.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Fetches the current state of a subscription.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] if the provider is unreachable or refuses.
    async fn retrieve_subscription(&self, id: &str) -> Result<SubscriptionSnapshot, PaymentError>;
}
