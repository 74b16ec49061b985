//! Domain events emitted after committed state transitions.
//!
//! Every event is published through the [`super::EventBus`] only after the
//! storage session that produced it has committed. Subscribers (the
//! notification dispatcher) can fail independently without touching the
//! transition they report on.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Placement, SponsorshipId, SubmissionId, Tier, ToolId};

/// Domain event describing something that already happened.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectoryEvent {
    /// A submission was promoted into a public tool.
    SubmissionApproved {
        /// Source submission.
        submission_id: SubmissionId,
        /// Resulting (or pre-existing) tool.
        tool_id: ToolId,
        /// Public slug of the tool.
        tool_slug: String,
        /// Submitted tool name.
        tool_name: String,
        /// Submitter email.
        email: String,
        /// Tier of the listing.
        tier: Tier,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Payment for a paid submission failed.
    SubmissionPaymentFailed {
        /// Affected submission.
        submission_id: SubmissionId,
        /// Submitted tool name.
        tool_name: String,
        /// Submitter email.
        email: String,
        /// Provider-supplied reason, if any.
        reason: Option<String>,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A sponsorship became active for the first time.
    SponsorshipActivated {
        /// Sponsorship row.
        sponsorship_id: SponsorshipId,
        /// Purchased slot.
        placement: Placement,
        /// Sponsor display name.
        sponsor_name: Option<String>,
        /// Sponsor contact email.
        sponsor_email: Option<String>,
        /// End of the paid period.
        current_period_end: Option<DateTime<Utc>>,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A provider event could not be processed.
    WebhookFailed {
        /// Provider event id.
        event_id: String,
        /// Provider event type.
        event_type: String,
        /// Captured error text.
        error: String,
        /// Failure timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl DirectoryEvent {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SubmissionApproved { .. } => "submission_approved",
            Self::SubmissionPaymentFailed { .. } => "submission_payment_failed",
            Self::SponsorshipActivated { .. } => "sponsorship_activated",
            Self::WebhookFailed { .. } => "webhook_failed",
        }
    }
}
