//! Public tool listings and slug derivation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Submission, SubmissionId, Tier, ToolId};

/// Accent colour used when a listing does not set one.
pub const DEFAULT_COLOR: &str = "#6366f1";
/// Card gradient used when a listing does not set one.
pub const DEFAULT_GRADIENT: &str = "from-indigo-500 to-purple-600";

/// A publicly listed tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    /// Opaque identity.
    pub id: ToolId,
    /// Globally unique URL-safe slug; stable once assigned.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Listing description.
    pub description: String,
    /// Category label.
    pub category: String,
    /// Pricing label.
    pub pricing: String,
    /// Canonical website URL, unique across tools.
    pub website_url: String,
    /// Optional affiliate link shown instead of the website.
    pub affiliate_url: Option<String>,
    /// Feature bullet points.
    pub features: Vec<String>,
    /// Pros bullet points.
    pub pros: Vec<String>,
    /// Cons bullet points.
    pub cons: Vec<String>,
    /// Accent colour.
    pub color: String,
    /// Card gradient classes.
    pub gradient: String,
    /// Tier inherited from the source submission.
    pub tier: Tier,
    /// True iff the tier is [`Tier::Premium`].
    pub is_featured: bool,
    /// Submission this tool was promoted from, if any.
    pub source_submission_id: Option<SubmissionId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insertable tool row produced by the promotion engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTool {
    /// Identity to assign.
    pub id: ToolId,
    /// Candidate slug; the insert fails softly if it is taken.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Listing description.
    pub description: String,
    /// Category label.
    pub category: String,
    /// Pricing label.
    pub pricing: String,
    /// Canonical website URL.
    pub website_url: String,
    /// Optional affiliate link.
    pub affiliate_url: Option<String>,
    /// Feature bullet points.
    pub features: Vec<String>,
    /// Pros bullet points.
    pub pros: Vec<String>,
    /// Cons bullet points.
    pub cons: Vec<String>,
    /// Accent colour.
    pub color: String,
    /// Card gradient classes.
    pub gradient: String,
    /// Listing tier.
    pub tier: Tier,
    /// Featured flag.
    pub is_featured: bool,
    /// Source submission.
    pub source_submission_id: Option<SubmissionId>,
}

impl NewTool {
    /// Builds the listing for an approved submission with the given slug.
    #[must_use]
    pub fn from_submission(submission: &Submission, slug: String) -> Self {
        Self {
            id: ToolId::new(),
            slug,
            title: submission.tool_name.clone(),
            description: submission.description.clone(),
            category: submission.category.clone(),
            pricing: submission.pricing.clone(),
            website_url: submission.website_url.clone(),
            affiliate_url: None,
            features: Vec::new(),
            pros: Vec::new(),
            cons: Vec::new(),
            color: DEFAULT_COLOR.to_string(),
            gradient: DEFAULT_GRADIENT.to_string(),
            tier: submission.tier,
            is_featured: submission.tier == Tier::Premium,
            source_submission_id: Some(submission.id),
        }
    }
}

/// Derives the base slug for a tool name.
///
/// Lowercases, collapses every run of non-alphanumeric characters into one
/// hyphen and trims hyphens from both ends. An empty result falls back to
/// `tool-<first 6 chars of the submission id>`.
#[must_use]
pub fn base_slug(name: &str, submission_id: SubmissionId) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        let id = submission_id.to_string();
        let prefix: String = id.chars().take(6).collect();
        return format!("tool-{prefix}");
    }
    slug
}

/// Slug candidate for the `n`-th probe: `base`, `base-2`, `base-3`, …
#[must_use]
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}
