//! Public catalog DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::Tool;

/// A listed tool.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolDto {
    /// Tool id.
    pub id: uuid::Uuid,
    /// Public slug.
    pub slug: String,
    /// Display name.
    pub title: String,
    /// Description.
    pub description: String,
    /// Category.
    pub category: String,
    /// Pricing label.
    pub pricing: String,
    /// Website URL.
    pub website_url: String,
    /// Affiliate link, if any.
    pub affiliate_url: Option<String>,
    /// Feature bullets.
    pub features: Vec<String>,
    /// Pros.
    pub pros: Vec<String>,
    /// Cons.
    pub cons: Vec<String>,
    /// Accent color.
    pub color: String,
    /// Card gradient.
    pub gradient: String,
    /// Listing tier.
    pub tier: String,
    /// Whether the tool is featured.
    pub is_featured: bool,
    /// Listing time.
    pub created_at: DateTime<Utc>,
}

impl From<Tool> for ToolDto {
    fn from(t: Tool) -> Self {
        Self {
            id: *t.id.as_uuid(),
            slug: t.slug,
            title: t.title,
            description: t.description,
            category: t.category,
            pricing: t.pricing,
            website_url: t.website_url,
            affiliate_url: t.affiliate_url,
            features: t.features,
            pros: t.pros,
            cons: t.cons,
            color: t.color,
            gradient: t.gradient,
            tier: t.tier.to_string(),
            is_featured: t.is_featured,
            created_at: t.created_at,
        }
    }
}

/// Paginated list response for `GET /tools`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ToolListResponse {
    /// Tools on this page, featured first.
    pub data: Vec<ToolDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
