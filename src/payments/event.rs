//! Provider webhook payloads, decoded once into a closed set of variants.
//!
//! Only the fields reconciliation acts on are kept. Unknown event types
//! decode to [`ProviderEventKind::Other`] and are acknowledged unhandled.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{Placement, SponsorshipIntent, SubmissionId, Tier, ToolId};

/// Metadata key naming the purchase kind.
pub const META_TYPE: &str = "type";
/// `type` value of a sponsorship purchase.
pub const TYPE_SPONSORSHIP: &str = "sponsorship";
/// `type` value of a paid submission.
pub const TYPE_SUBMISSION: &str = "submission";

const META_PLACEMENT: &str = "placement";
const META_TOOL_SLUG: &str = "toolSlug";
const META_TOOL_ID: &str = "toolId";
const META_SPONSOR_NAME: &str = "sponsorName";
const META_SPONSOR_URL: &str = "sponsorUrl";
const META_SPONSOR_EMAIL: &str = "sponsorEmail";
const META_SPONSOR_COPY: &str = "sponsorCopy";
const META_SUBMISSION_ID: &str = "submissionId";
const META_TIER: &str = "tier";

/// A structurally invalid webhook body.
#[derive(Debug, thiserror::Error)]
#[error("invalid provider event: {0}")]
pub struct EventParseError(String);

/// Checkout metadata that names a purchase but cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// `type` is present but not one we issue.
    #[error("unknown purchase type: {0}")]
    UnknownType(String),

    /// A required key is absent or blank.
    #[error("metadata key missing: {0}")]
    Missing(&'static str),

    /// A key holds a value that does not parse.
    #[error("metadata key {key} has invalid value {value:?}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

/// What a checkout was for, as encoded into provider metadata at checkout
/// time and decoded again by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutIntent {
    /// Recurring placement purchase.
    Sponsorship(SponsorshipIntent),
    /// One-time payment for a priority or premium submission.
    SubmissionPayment {
        /// Submission being paid for.
        submission_id: SubmissionId,
        /// Tier that was purchased.
        tier: Tier,
    },
}

fn non_blank(metadata: &BTreeMap<String, String>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl CheckoutIntent {
    /// Encodes the intent as provider metadata.
    #[must_use]
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                metadata.insert(key.to_string(), value);
            }
        };
        match self {
            Self::Sponsorship(intent) => {
                put(META_TYPE, Some(TYPE_SPONSORSHIP.to_string()));
                put(META_PLACEMENT, Some(intent.placement.as_str().to_string()));
                put(META_TOOL_SLUG, intent.tool_slug.clone());
                put(META_TOOL_ID, intent.tool_id.map(|id| id.to_string()));
                put(META_SPONSOR_NAME, intent.sponsor_name.clone());
                put(META_SPONSOR_URL, intent.sponsor_url.clone());
                put(META_SPONSOR_EMAIL, intent.sponsor_email.clone());
                put(META_SPONSOR_COPY, intent.sponsor_copy.clone());
            }
            Self::SubmissionPayment {
                submission_id,
                tier,
            } => {
                put(META_TYPE, Some(TYPE_SUBMISSION.to_string()));
                put(META_SUBMISSION_ID, Some(submission_id.to_string()));
                put(META_TIER, Some(tier.as_str().to_string()));
            }
        }
        metadata
    }

    /// Decodes provider metadata. `Ok(None)` when the metadata carries no
    /// purchase type at all (a checkout this service did not create).
    ///
    /// # Errors
    ///
    /// Returns a [`MetadataError`] when the type is known but a field is
    /// missing or malformed, or when the type is unknown.
    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Result<Option<Self>, MetadataError> {
        let Some(kind) = non_blank(metadata, META_TYPE) else {
            return Ok(None);
        };
        match kind.as_str() {
            TYPE_SPONSORSHIP => {
                let raw = non_blank(metadata, META_PLACEMENT)
                    .ok_or(MetadataError::Missing(META_PLACEMENT))?;
                let placement = raw.parse::<Placement>().map_err(|_| MetadataError::Invalid {
                    key: META_PLACEMENT,
                    value: raw.clone(),
                })?;
                let tool_id = non_blank(metadata, META_TOOL_ID)
                    .map(|raw| {
                        uuid::Uuid::parse_str(&raw)
                            .map(ToolId::from_uuid)
                            .map_err(|_| MetadataError::Invalid {
                                key: META_TOOL_ID,
                                value: raw.clone(),
                            })
                    })
                    .transpose()?;
                if placement.requires_tool() && tool_id.is_none() {
                    return Err(MetadataError::Missing(META_TOOL_ID));
                }
                Ok(Some(Self::Sponsorship(SponsorshipIntent {
                    placement,
                    tool_slug: non_blank(metadata, META_TOOL_SLUG),
                    tool_id,
                    sponsor_name: non_blank(metadata, META_SPONSOR_NAME),
                    sponsor_url: non_blank(metadata, META_SPONSOR_URL),
                    sponsor_email: non_blank(metadata, META_SPONSOR_EMAIL),
                    sponsor_copy: non_blank(metadata, META_SPONSOR_COPY),
                })))
            }
            TYPE_SUBMISSION => {
                let raw = non_blank(metadata, META_SUBMISSION_ID)
                    .ok_or(MetadataError::Missing(META_SUBMISSION_ID))?;
                let submission_id = uuid::Uuid::parse_str(&raw)
                    .map(SubmissionId::from_uuid)
                    .map_err(|_| MetadataError::Invalid {
                        key: META_SUBMISSION_ID,
                        value: raw.clone(),
                    })?;
                let raw_tier = non_blank(metadata, META_TIER).ok_or(MetadataError::Missing(META_TIER))?;
                let tier = raw_tier.parse::<Tier>().map_err(|_| MetadataError::Invalid {
                    key: META_TIER,
                    value: raw_tier.clone(),
                })?;
                Ok(Some(Self::SubmissionPayment {
                    submission_id,
                    tier,
                }))
            }
            other => Err(MetadataError::UnknownType(other.to_string())),
        }
    }
}

fn from_unix(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

/// A provider subscription as seen in events and API responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawSubscription")]
pub struct SubscriptionSnapshot {
    /// Subscription reference.
    pub id: String,
    /// Provider status string (`active`, `past_due`, ...).
    pub status: String,
    /// End of the current paid period.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Metadata copied from checkout.
    pub metadata: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawSubscription {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    items: Option<RawList<RawSubscriptionItem>>,
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
struct RawList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct RawSubscriptionItem {
    #[serde(default)]
    current_period_end: Option<i64>,
}

impl From<RawSubscription> for SubscriptionSnapshot {
    fn from(raw: RawSubscription) -> Self {
        // Newer API versions report the period on the subscription items.
        let item_period_end = raw
            .items
            .and_then(|items| items.data.into_iter().find_map(|item| item.current_period_end));
        Self {
            id: raw.id,
            status: raw.status,
            current_period_end: from_unix(raw.current_period_end.or(item_period_end)),
            metadata: raw.metadata.unwrap_or_default(),
        }
    }
}

/// The checkout session object carried by `checkout.session.*` events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawCheckoutSession")]
pub struct CheckoutSessionObject {
    /// Session id.
    pub id: String,
    /// Subscription created by a subscription-mode session.
    pub subscription: Option<String>,
    /// Payment intent of a payment-mode session.
    pub payment_intent: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: Option<String>,
    /// Email the customer entered.
    pub customer_email: Option<String>,
    /// Metadata set at checkout.
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutSessionObject {
    /// Whether the provider reports the session as paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }
}

#[derive(Deserialize)]
struct RawCheckoutSession {
    id: String,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<RawCustomerDetails>,
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
struct RawCustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

impl From<RawCheckoutSession> for CheckoutSessionObject {
    fn from(raw: RawCheckoutSession) -> Self {
        Self {
            id: raw.id,
            subscription: raw.subscription,
            payment_intent: raw.payment_intent,
            payment_status: raw.payment_status,
            customer_email: raw
                .customer_details
                .and_then(|details| details.email)
                .or(raw.customer_email),
            metadata: raw.metadata.unwrap_or_default(),
        }
    }
}

/// The payment intent object carried by `payment_intent.payment_failed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawPaymentIntent")]
pub struct PaymentIntentObject {
    /// Payment intent id.
    pub id: String,
    /// Provider failure message, if any.
    pub failure_message: Option<String>,
    /// Metadata set at checkout.
    pub metadata: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawPaymentIntent {
    id: String,
    #[serde(default)]
    last_payment_error: Option<RawPaymentError>,
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
struct RawPaymentError {
    #[serde(default)]
    message: Option<String>,
}

impl From<RawPaymentIntent> for PaymentIntentObject {
    fn from(raw: RawPaymentIntent) -> Self {
        Self {
            id: raw.id,
            failure_message: raw.last_payment_error.and_then(|e| e.message),
            metadata: raw.metadata.unwrap_or_default(),
        }
    }
}

/// The invoice object carried by `invoice.payment_failed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawInvoice")]
pub struct InvoiceObject {
    /// Invoice id.
    pub id: String,
    /// Subscription the invoice bills, if any.
    pub subscription: Option<String>,
}

#[derive(Deserialize)]
struct RawInvoice {
    id: String,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    parent: Option<RawInvoiceParent>,
}

#[derive(Deserialize)]
struct RawInvoiceParent {
    #[serde(default)]
    subscription_details: Option<RawSubscriptionDetails>,
}

#[derive(Deserialize)]
struct RawSubscriptionDetails {
    #[serde(default)]
    subscription: Option<String>,
}

impl From<RawInvoice> for InvoiceObject {
    fn from(raw: RawInvoice) -> Self {
        let from_parent = raw
            .parent
            .and_then(|p| p.subscription_details)
            .and_then(|d| d.subscription);
        Self {
            id: raw.id,
            subscription: raw.subscription.or(from_parent),
        }
    }
}

/// Event-type specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEventKind {
    /// `checkout.session.completed`.
    CheckoutCompleted(CheckoutSessionObject),
    /// `checkout.session.async_payment_succeeded`.
    CheckoutAsyncPaymentSucceeded(CheckoutSessionObject),
    /// `checkout.session.async_payment_failed`.
    CheckoutAsyncPaymentFailed(CheckoutSessionObject),
    /// `payment_intent.payment_failed`.
    PaymentIntentFailed(PaymentIntentObject),
    /// `customer.subscription.updated`.
    SubscriptionUpdated(SubscriptionSnapshot),
    /// `customer.subscription.deleted`.
    SubscriptionDeleted(SubscriptionSnapshot),
    /// `invoice.payment_failed`.
    InvoicePaymentFailed(InvoiceObject),
    /// Any other event type.
    Other,
}

/// A verified provider webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    /// Provider event id; the idempotency key.
    pub id: String,
    /// Provider event type string.
    pub event_type: String,
    /// Decoded payload.
    pub kind: ProviderEventKind,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

fn object<T: serde::de::DeserializeOwned>(
    event_type: &str,
    value: serde_json::Value,
) -> Result<T, EventParseError> {
    serde_json::from_value(value).map_err(|e| EventParseError(format!("{event_type}: {e}")))
}

impl ProviderEvent {
    /// Decodes a raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns [`EventParseError`] if the body is not an event envelope or
    /// a handled event type carries a malformed object.
    pub fn parse(payload: &[u8]) -> Result<Self, EventParseError> {
        let raw: RawEvent =
            serde_json::from_slice(payload).map_err(|e| EventParseError(e.to_string()))?;
        let RawEvent {
            id,
            event_type,
            data,
        } = raw;
        let value = data.object;
        let kind = match event_type.as_str() {
            "checkout.session.completed" => {
                ProviderEventKind::CheckoutCompleted(object(&event_type, value)?)
            }
            "checkout.session.async_payment_succeeded" => {
                ProviderEventKind::CheckoutAsyncPaymentSucceeded(object(&event_type, value)?)
            }
            "checkout.session.async_payment_failed" => {
                ProviderEventKind::CheckoutAsyncPaymentFailed(object(&event_type, value)?)
            }
            "payment_intent.payment_failed" => {
                ProviderEventKind::PaymentIntentFailed(object(&event_type, value)?)
            }
            "customer.subscription.updated" => {
                ProviderEventKind::SubscriptionUpdated(object(&event_type, value)?)
            }
            "customer.subscription.deleted" => {
                ProviderEventKind::SubscriptionDeleted(object(&event_type, value)?)
            }
            "invoice.payment_failed" => {
                ProviderEventKind::InvoicePaymentFailed(object(&event_type, value)?)
            }
            _ => ProviderEventKind::Other,
        };
        Ok(Self {
            id,
            event_type,
            kind,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: &serde_json::Value) -> ProviderEvent {
        let Ok(event) = ProviderEvent::parse(value.to_string().as_bytes()) else {
            panic!("event should parse");
        };
        event
    }

    #[test]
    fn checkout_completed_prefers_customer_details_email() {
        let event = parse(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_1",
                "subscription": "sub_1",
                "payment_status": "paid",
                "customer_email": null,
                "customer_details": { "email": "buyer@example.com" },
                "metadata": { "type": "sponsorship", "placement": "newsletter" }
            }}
        }));
        let ProviderEventKind::CheckoutCompleted(session) = event.kind else {
            panic!("expected checkout completed");
        };
        assert_eq!(session.subscription.as_deref(), Some("sub_1"));
        assert_eq!(session.customer_email.as_deref(), Some("buyer@example.com"));
        assert!(session.is_paid());
    }

    #[test]
    fn subscription_period_end_falls_back_to_items() {
        let event = parse(&json!({
            "id": "evt_2",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_1",
                "status": "active",
                "items": { "data": [ { "current_period_end": 1_900_000_000 } ] },
                "metadata": null
            }}
        }));
        let ProviderEventKind::SubscriptionUpdated(sub) = event.kind else {
            panic!("expected subscription updated");
        };
        assert_eq!(sub.current_period_end, DateTime::from_timestamp(1_900_000_000, 0));
        assert!(sub.metadata.is_empty());
    }

    #[test]
    fn invoice_subscription_from_parent() {
        let event = parse(&json!({
            "id": "evt_3",
            "type": "invoice.payment_failed",
            "data": { "object": {
                "id": "in_1",
                "parent": { "subscription_details": { "subscription": "sub_9" } }
            }}
        }));
        let ProviderEventKind::InvoicePaymentFailed(invoice) = event.kind else {
            panic!("expected invoice payment failed");
        };
        assert_eq!(invoice.subscription.as_deref(), Some("sub_9"));
    }

    #[test]
    fn unknown_types_are_other() {
        let event = parse(&json!({
            "id": "evt_4",
            "type": "charge.refunded",
            "data": { "object": { "anything": true } }
        }));
        assert_eq!(event.kind, ProviderEventKind::Other);
    }

    #[test]
    fn envelope_errors_are_rejected() {
        assert!(ProviderEvent::parse(b"not json").is_err());
        assert!(ProviderEvent::parse(br#"{"id":"evt_5","type":"x"}"#).is_err());
    }

    #[test]
    fn sponsorship_metadata_round_trip() {
        let intent = CheckoutIntent::Sponsorship(SponsorshipIntent {
            placement: Placement::SidebarAd,
            tool_slug: Some("cursor".to_string()),
            tool_id: Some(ToolId::new()),
            sponsor_name: Some("Acme".to_string()),
            sponsor_url: None,
            sponsor_email: Some("ads@acme.dev".to_string()),
            sponsor_copy: None,
        });
        let metadata = intent.to_metadata();
        assert_eq!(metadata.get(META_TYPE).map(String::as_str), Some(TYPE_SPONSORSHIP));
        assert!(!metadata.contains_key(META_SPONSOR_URL));
        assert_eq!(CheckoutIntent::from_metadata(&metadata), Ok(Some(intent)));
    }

    #[test]
    fn tool_scoped_metadata_needs_tool_id() {
        let metadata = BTreeMap::from([
            ("type".to_string(), "sponsorship".to_string()),
            ("placement".to_string(), "featured_spotlight".to_string()),
        ]);
        assert_eq!(
            CheckoutIntent::from_metadata(&metadata),
            Err(MetadataError::Missing(META_TOOL_ID))
        );
    }

    #[test]
    fn foreign_checkouts_have_no_intent() {
        assert_eq!(CheckoutIntent::from_metadata(&BTreeMap::new()), Ok(None));
        let metadata = BTreeMap::from([("type".to_string(), "gift_card".to_string())]);
        assert!(matches!(
            CheckoutIntent::from_metadata(&metadata),
            Err(MetadataError::UnknownType(_))
        ));
    }
}
