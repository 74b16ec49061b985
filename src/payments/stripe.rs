//! Stripe REST client.
//!
//! Talks form-encoded HTTP to the Stripe API with `reqwest`. Only the two
//! calls the core needs are implemented.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    CheckoutMode, CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentProvider,
    SubscriptionSnapshot,
};
use crate::config::StripeSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// [`PaymentProvider`] backed by the Stripe API.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl StripeClient {
    /// Builds a client from settings. A missing secret key is allowed; every
    /// call then fails with [`PaymentError::NotConfigured`].
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Transport`] if the HTTP client cannot be built.
    pub fn new(settings: &StripeSettings) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key.clone(),
        })
    }

    fn key(&self) -> Result<&str, PaymentError> {
        self.secret_key.as_deref().ok_or(PaymentError::NotConfigured)
    }

    async fn read<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let message = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| status.to_string());
        Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Form body for `POST /v1/checkout/sessions`.
fn checkout_form(request: &CheckoutSessionRequest) -> String {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    form.append_pair("mode", request.mode.as_str())
        .append_pair("line_items[0][price]", &request.price_id)
        .append_pair("line_items[0][quantity]", "1")
        .append_pair("success_url", &request.success_url)
        .append_pair("cancel_url", &request.cancel_url);
    if let Some(email) = &request.customer_email {
        form.append_pair("customer_email", email);
    }
    let nested = match request.mode {
        CheckoutMode::Subscription => "subscription_data",
        CheckoutMode::Payment => "payment_intent_data",
    };
    for (key, value) in &request.metadata {
        form.append_pair(&format!("metadata[{key}]"), value);
        form.append_pair(&format!("{nested}[metadata][{key}]"), value);
    }
    form.finish()
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.key()?)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(checkout_form(request))
            .send()
            .await?;
        let session: SessionResponse = Self::read(response).await?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::Decode("checkout session has no url".to_string()))?;
        tracing::debug!(session_id = %session.id, mode = request.mode.as_str(), "checkout session created");
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn retrieve_subscription(&self, id: &str) -> Result<SubscriptionSnapshot, PaymentError> {
        let response = self
            .client
            .get(format!("{}/v1/subscriptions/{id}", self.api_base))
            .bearer_auth(self.key()?)
            .send()
            .await?;
        Self::read(response).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn request(mode: CheckoutMode) -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            mode,
            price_id: "price_123".to_string(),
            customer_email: Some("buyer@example.com".to_string()),
            success_url: "https://vibestack.dev/advertise/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "https://vibestack.dev/advertise".to_string(),
            metadata: BTreeMap::from([("type".to_string(), "sponsorship".to_string())]),
        }
    }

    fn pairs(form: &str) -> Vec<(String, String)> {
        url::form_urlencoded::parse(form.as_bytes())
            .into_owned()
            .collect()
    }

    #[test]
    fn subscription_metadata_is_copied_to_subscription() {
        let form = pairs(&checkout_form(&request(CheckoutMode::Subscription)));
        assert!(form.contains(&("mode".to_string(), "subscription".to_string())));
        assert!(form.contains(&("metadata[type]".to_string(), "sponsorship".to_string())));
        assert!(form.contains(&(
            "subscription_data[metadata][type]".to_string(),
            "sponsorship".to_string()
        )));
    }

    #[test]
    fn payment_metadata_is_copied_to_payment_intent() {
        let form = pairs(&checkout_form(&request(CheckoutMode::Payment)));
        assert!(form.contains(&(
            "payment_intent_data[metadata][type]".to_string(),
            "sponsorship".to_string()
        )));
        assert!(!form.iter().any(|(k, _)| k.starts_with("subscription_data")));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let Ok(client) = StripeClient::new(&StripeSettings::default()) else {
            panic!("client should build");
        };
        let result = client.retrieve_subscription("sub_1").await;
        assert!(matches!(result, Err(PaymentError::NotConfigured)));
    }
}
