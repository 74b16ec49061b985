//! Submission DTOs for intake and the admin review queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{PaginationMeta, PaginationParams};
use crate::domain::Submission;
use crate::service::Approval;

/// Request body for `POST /submissions`.
///
/// Documentation only: the handler reads the raw body so the size limit and
/// honeypot run before any field is trusted.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionRequest {
    /// Tool name, 2-100 characters.
    pub tool_name: String,
    /// Description, 10-2000 characters.
    pub description: String,
    /// Absolute http(s) URL of the tool.
    pub website_url: String,
    /// Category name.
    pub category: String,
    /// Pricing model label.
    pub pricing: String,
    /// Contact email.
    pub email: String,
    /// `free` (default), `priority` or `premium`.
    #[serde(default)]
    pub tier: Option<String>,
    /// Amount in cents; positive for paid tiers, zero for free.
    #[serde(default)]
    pub amount: Option<i64>,
}

/// Response body for `POST /submissions` (201 Created).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCreatedResponse {
    /// New submission id.
    pub id: uuid::Uuid,
    /// Always `pending`.
    pub status: String,
}

/// A submission as shown to administrators.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDto {
    /// Submission id.
    pub id: uuid::Uuid,
    /// Tool name.
    pub tool_name: String,
    /// Description.
    pub description: String,
    /// Normalized website URL.
    pub website_url: String,
    /// Category.
    pub category: String,
    /// Pricing label.
    pub pricing: String,
    /// Contact email.
    pub email: String,
    /// Requested tier.
    pub tier: String,
    /// Amount in cents.
    pub amount: i64,
    /// `pending`, `approved`, `rejected` or `failed`.
    pub status: String,
    /// Provider payment reference, once paid.
    pub payment_id: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl From<Submission> for SubmissionDto {
    fn from(s: Submission) -> Self {
        Self {
            id: *s.id.as_uuid(),
            tool_name: s.tool_name,
            description: s.description,
            website_url: s.website_url,
            category: s.category,
            pricing: s.pricing,
            email: s.email,
            tier: s.tier.to_string(),
            amount: s.amount_cents,
            status: s.status.to_string(),
            payment_id: s.payment_id,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Query parameters for `GET /admin/submissions`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SubmissionListParams {
    /// Only submissions with this status.
    #[serde(default)]
    pub status: Option<String>,
    /// Page number (1-indexed).
    #[serde(default)]
    pub page: Option<u32>,
    /// Items per page (max 100).
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl SubmissionListParams {
    /// Pagination part, clamped.
    #[must_use]
    pub fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
        .clamped()
    }
}

/// Paginated list response for `GET /admin/submissions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionListResponse {
    /// Submissions on this page, newest first.
    pub data: Vec<SubmissionDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Response body for `POST /admin/submissions/{id}/approve`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveResponse {
    /// Approved submission.
    pub submission_id: uuid::Uuid,
    /// Listed tool.
    pub tool_id: uuid::Uuid,
    /// Public slug of the tool.
    pub tool_slug: String,
    /// Always `approved`.
    pub status: String,
    /// False when the submission had already been approved.
    pub newly_approved: bool,
}

impl From<Approval> for ApproveResponse {
    fn from(approval: Approval) -> Self {
        Self {
            submission_id: *approval.submission.id.as_uuid(),
            tool_id: *approval.tool.id.as_uuid(),
            tool_slug: approval.tool.slug,
            status: approval.submission.status.to_string(),
            newly_approved: approval.newly_approved,
        }
    }
}
