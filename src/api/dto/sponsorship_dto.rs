//! Sponsorship DTOs: checkout request and live placement lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::Sponsorship;
use crate::service::SponsorshipCheckout;

/// Request body for `POST /sponsorships/checkout`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSponsorshipCheckoutRequest {
    /// `newsletter`, `featured_spotlight` or `sidebar_ad`.
    pub placement: String,
    /// Target tool; required unless the placement is `newsletter`.
    #[serde(default)]
    pub tool_slug: Option<String>,
    /// Sponsor display name.
    #[serde(default)]
    pub sponsor_name: Option<String>,
    /// Sponsor landing page.
    #[serde(default)]
    pub sponsor_url: Option<String>,
    /// Sponsor contact email.
    #[serde(default)]
    pub sponsor_email: Option<String>,
    /// Ad copy, at most 500 characters.
    #[serde(default)]
    pub sponsor_copy: Option<String>,
}

impl From<CreateSponsorshipCheckoutRequest> for SponsorshipCheckout {
    fn from(req: CreateSponsorshipCheckoutRequest) -> Self {
        Self {
            placement: req.placement,
            tool_slug: req.tool_slug,
            sponsor_name: req.sponsor_name,
            sponsor_url: req.sponsor_url,
            sponsor_email: req.sponsor_email,
            sponsor_copy: req.sponsor_copy,
        }
    }
}

/// Query parameters for `GET /sponsorships/active`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ActiveSponsorshipParams {
    /// Placement to look up.
    pub placement: String,
    /// Tool for tool-scoped placements.
    #[serde(default)]
    pub tool_slug: Option<String>,
}

/// A sponsorship as rendered by the site.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipDto {
    /// Sponsorship id.
    pub id: uuid::Uuid,
    /// Placement.
    pub placement: String,
    /// Sponsored tool, for tool-scoped placements.
    pub tool_id: Option<uuid::Uuid>,
    /// Sponsor display name.
    pub sponsor_name: Option<String>,
    /// Sponsor landing page.
    pub sponsor_url: Option<String>,
    /// Ad copy.
    pub sponsor_copy: Option<String>,
    /// End of the paid period.
    pub current_period_end: Option<DateTime<Utc>>,
}

impl From<Sponsorship> for SponsorshipDto {
    fn from(s: Sponsorship) -> Self {
        Self {
            id: *s.id.as_uuid(),
            placement: s.placement.to_string(),
            tool_id: s.tool_id.map(|id| *id.as_uuid()),
            sponsor_name: s.sponsor_name,
            sponsor_url: s.sponsor_url,
            sponsor_copy: s.sponsor_copy,
            current_period_end: s.current_period_end,
        }
    }
}

/// Response body for `GET /sponsorships/active`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveSponsorshipResponse {
    /// The live sponsorship, or `null` when the slot is free.
    pub sponsorship: Option<SponsorshipDto>,
}
