//! Database row models and their conversion into domain types.
//!
//! Enum-like columns are stored as text and parsed on the way out; an
//! unknown value is reported as a persistence error rather than silently
//! defaulted.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Sponsorship, SponsorshipId, Submission, SubmissionId, Tool, ToolId, WebhookEvent,
    WebhookEventId,
};
use crate::error::AppError;

fn parse_column<T: FromStr<Err = String>>(raw: &str) -> Result<T, AppError> {
    raw.parse().map_err(AppError::PersistenceError)
}

/// A row of the `submissions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubmissionRow {
    /// Primary key.
    pub id: Uuid,
    /// Tool name.
    pub tool_name: String,
    /// Description.
    pub description: String,
    /// Website URL.
    pub website_url: String,
    /// Category label.
    pub category: String,
    /// Pricing label.
    pub pricing: String,
    /// Contact email.
    pub email: String,
    /// Tier name.
    pub tier: String,
    /// Amount in cents.
    pub amount_cents: i64,
    /// Status name.
    pub status: String,
    /// Provider payment reference.
    pub payment_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = AppError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SubmissionId::from_uuid(row.id),
            tool_name: row.tool_name,
            description: row.description,
            website_url: row.website_url,
            category: row.category,
            pricing: row.pricing,
            email: row.email,
            tier: parse_column(&row.tier)?,
            amount_cents: row.amount_cents,
            status: parse_column(&row.status)?,
            payment_id: row.payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row of the `tools` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ToolRow {
    /// Primary key.
    pub id: Uuid,
    /// Unique slug.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Category label.
    pub category: String,
    /// Pricing label.
    pub pricing: String,
    /// Unique website URL.
    pub website_url: String,
    /// Affiliate link.
    pub affiliate_url: Option<String>,
    /// Feature list.
    pub features: Vec<String>,
    /// Pros list.
    pub pros: Vec<String>,
    /// Cons list.
    pub cons: Vec<String>,
    /// Accent colour.
    pub color: String,
    /// Card gradient.
    pub gradient: String,
    /// Tier name.
    pub tier: String,
    /// Featured flag.
    pub is_featured: bool,
    /// Source submission.
    pub source_submission_id: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ToolRow> for Tool {
    type Error = AppError;

    fn try_from(row: ToolRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ToolId::from_uuid(row.id),
            slug: row.slug,
            title: row.title,
            description: row.description,
            category: row.category,
            pricing: row.pricing,
            website_url: row.website_url,
            affiliate_url: row.affiliate_url,
            features: row.features,
            pros: row.pros,
            cons: row.cons,
            color: row.color,
            gradient: row.gradient,
            tier: parse_column(&row.tier)?,
            is_featured: row.is_featured,
            source_submission_id: row.source_submission_id.map(SubmissionId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row of the `sponsorships` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SponsorshipRow {
    /// Primary key.
    pub id: Uuid,
    /// Placement name.
    pub placement: String,
    /// Status name.
    pub status: String,
    /// Linked tool.
    pub tool_id: Option<Uuid>,
    /// Sponsor name.
    pub sponsor_name: Option<String>,
    /// Sponsor URL.
    pub sponsor_url: Option<String>,
    /// Sponsor email.
    pub sponsor_email: Option<String>,
    /// Ad copy.
    pub sponsor_copy: Option<String>,
    /// End of the paid period.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Provider subscription reference.
    pub provider_subscription_id: String,
    /// Provider checkout session.
    pub provider_session_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SponsorshipRow> for Sponsorship {
    type Error = AppError;

    fn try_from(row: SponsorshipRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SponsorshipId::from_uuid(row.id),
            placement: parse_column(&row.placement)?,
            status: parse_column(&row.status)?,
            tool_id: row.tool_id.map(ToolId::from_uuid),
            sponsor_name: row.sponsor_name,
            sponsor_url: row.sponsor_url,
            sponsor_email: row.sponsor_email,
            sponsor_copy: row.sponsor_copy,
            current_period_end: row.current_period_end,
            provider_subscription_id: row.provider_subscription_id,
            provider_session_id: row.provider_session_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A sponsorship row returned by an upsert, with whether it was inserted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UpsertedSponsorshipRow {
    /// The stored row.
    #[sqlx(flatten)]
    pub row: SponsorshipRow,
    /// True when the upsert inserted rather than updated.
    pub created: bool,
}

/// A row of the `webhook_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookEventRow {
    /// Primary key.
    pub id: Uuid,
    /// Provider event id.
    pub provider_event_id: String,
    /// Provider event type.
    pub event_type: String,
    /// Status name.
    pub status: String,
    /// Last error text.
    pub error: Option<String>,
    /// Claim count.
    pub attempts: i32,
    /// First receipt.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for WebhookEvent {
    type Error = AppError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: WebhookEventId::from_uuid(row.id),
            provider_event_id: row.provider_event_id,
            event_type: row.event_type,
            status: parse_column(&row.status)?,
            error: row.error,
            attempts: row.attempts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
