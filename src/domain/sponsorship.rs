//! Paid, time-boxed placements.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SponsorshipId, ToolId};

/// A purchasable advertising slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Sponsor block in the weekly newsletter.
    Newsletter,
    /// Featured spotlight on a tool page.
    FeaturedSpotlight,
    /// Sidebar ad next to a tool.
    SidebarAd,
}

impl Placement {
    /// Every placement, in display order.
    pub const ALL: [Self; 3] = [Self::Newsletter, Self::FeaturedSpotlight, Self::SidebarAd];

    /// Stable snake_case name used in storage and provider metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newsletter => "newsletter",
            Self::FeaturedSpotlight => "featured_spotlight",
            Self::SidebarAd => "sidebar_ad",
        }
    }

    /// Whether a purchase of this placement must name a target tool.
    #[must_use]
    pub const fn requires_tool(self) -> bool {
        !matches!(self, Self::Newsletter)
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newsletter" => Ok(Self::Newsletter),
            "featured_spotlight" => Ok(Self::FeaturedSpotlight),
            "sidebar_ad" => Ok(Self::SidebarAd),
            other => Err(format!("unknown placement: {other}")),
        }
    }
}

/// Billing status of a [`Sponsorship`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorshipStatus {
    /// Subscription exists but has not been paid yet.
    Pending,
    /// Paid and running.
    Active,
    /// Ended by the sponsor or the provider.
    Canceled,
    /// Latest renewal payment failed.
    PastDue,
}

impl SponsorshipStatus {
    /// Stable snake_case name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::PastDue => "past_due",
        }
    }

    /// Maps a provider subscription status onto ours.
    #[must_use]
    pub fn from_provider(status: &str) -> Self {
        match status {
            "active" | "trialing" => Self::Active,
            "past_due" | "unpaid" => Self::PastDue,
            "canceled" | "incomplete_expired" => Self::Canceled,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for SponsorshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SponsorshipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            "past_due" => Ok(Self::PastDue),
            other => Err(format!("unknown sponsorship status: {other}")),
        }
    }
}

/// A stored sponsorship row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sponsorship {
    /// Opaque identity.
    pub id: SponsorshipId,
    /// Purchased slot.
    pub placement: Placement,
    /// Billing status.
    pub status: SponsorshipStatus,
    /// Tool the placement is attached to, for tool-scoped placements.
    pub tool_id: Option<ToolId>,
    /// Sponsor display name.
    pub sponsor_name: Option<String>,
    /// Sponsor landing page.
    pub sponsor_url: Option<String>,
    /// Sponsor contact email.
    pub sponsor_email: Option<String>,
    /// Ad copy.
    pub sponsor_copy: Option<String>,
    /// End of the paid period.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Provider subscription reference; the reconciliation key.
    pub provider_subscription_id: String,
    /// Provider checkout session that created the subscription.
    pub provider_session_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Sponsorship {
    /// Whether this row may be shown at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == SponsorshipStatus::Active
            && self.current_period_end.is_some_and(|end| end > now)
    }
}

/// Everything the checkout step encoded about a sponsorship purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorshipIntent {
    /// Purchased slot.
    pub placement: Placement,
    /// Target tool slug, for tool-scoped placements.
    pub tool_slug: Option<String>,
    /// Target tool id, for tool-scoped placements.
    pub tool_id: Option<ToolId>,
    /// Sponsor display name.
    pub sponsor_name: Option<String>,
    /// Sponsor landing page.
    pub sponsor_url: Option<String>,
    /// Sponsor contact email.
    pub sponsor_email: Option<String>,
    /// Ad copy.
    pub sponsor_copy: Option<String>,
}

/// Create-or-refresh request keyed by provider subscription reference.
///
/// On conflict only `status`, `current_period_end` and (when present)
/// `provider_session_id` are refreshed; sponsor details keep their first
/// recorded values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorshipUpsert {
    /// Purchase details from checkout metadata.
    pub intent: SponsorshipIntent,
    /// Status to record.
    pub status: SponsorshipStatus,
    /// End of the paid period.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Provider subscription reference.
    pub provider_subscription_id: String,
    /// Provider checkout session, when known.
    pub provider_session_id: Option<String>,
}

/// Picks "the" active sponsorship among candidates: live rows only, ties
/// broken by the latest `current_period_end`.
#[must_use]
pub fn pick_active<'a, I>(candidates: I, now: DateTime<Utc>) -> Option<&'a Sponsorship>
where
    I: IntoIterator<Item = &'a Sponsorship>,
{
    candidates
        .into_iter()
        .filter(|s| s.is_live(now))
        .max_by_key(|s| s.current_period_end)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn sponsorship(status: SponsorshipStatus, end: Option<DateTime<Utc>>) -> Sponsorship {
        let now = Utc::now();
        Sponsorship {
            id: SponsorshipId::new(),
            placement: Placement::Newsletter,
            status,
            tool_id: None,
            sponsor_name: None,
            sponsor_url: None,
            sponsor_email: None,
            sponsor_copy: None,
            current_period_end: end,
            provider_subscription_id: format!("sub_{}", SponsorshipId::new()),
            provider_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn latest_period_end_wins() {
        let now = Utc::now();
        let short = sponsorship(SponsorshipStatus::Active, Some(now + Duration::days(3)));
        let long = sponsorship(SponsorshipStatus::Active, Some(now + Duration::days(20)));
        let rows = [short, long.clone()];
        assert_eq!(pick_active(&rows, now).map(|s| s.id), Some(long.id));
    }

    #[test]
    fn expired_and_inactive_rows_are_ignored() {
        let now = Utc::now();
        let rows = [
            sponsorship(SponsorshipStatus::Active, Some(now - Duration::days(1))),
            sponsorship(SponsorshipStatus::Canceled, Some(now + Duration::days(9))),
            sponsorship(SponsorshipStatus::Active, None),
        ];
        assert!(pick_active(&rows, now).is_none());
    }

    #[test]
    fn provider_status_mapping() {
        assert_eq!(SponsorshipStatus::from_provider("trialing"), SponsorshipStatus::Active);
        assert_eq!(SponsorshipStatus::from_provider("unpaid"), SponsorshipStatus::PastDue);
        assert_eq!(
            SponsorshipStatus::from_provider("incomplete_expired"),
            SponsorshipStatus::Canceled
        );
        assert_eq!(SponsorshipStatus::from_provider("incomplete"), SponsorshipStatus::Pending);
    }

    #[test]
    fn only_newsletter_is_untargeted() {
        assert!(!Placement::Newsletter.requires_tool());
        assert!(Placement::FeaturedSpotlight.requires_tool());
        assert!(Placement::SidebarAd.requires_tool());
    }
}
