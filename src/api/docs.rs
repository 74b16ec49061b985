//! OpenAPI document for every REST endpoint.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::dto;
use super::handlers::{admin, sponsorships, submissions, system, tools, webhooks};
use crate::error::{ErrorBody, ErrorResponse, FieldError};

/// Registers the admin bearer token scheme.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Generated OpenAPI specification.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "VibeStack directory API",
        description = "Tool submissions, moderation, sponsorship checkout and payment webhooks."
    ),
    paths(
        submissions::create_submission,
        submissions::create_submission_checkout,
        admin::list_submissions,
        admin::approve_submission,
        admin::webhook_stats,
        sponsorships::create_checkout,
        sponsorships::active_sponsorship,
        tools::list_tools,
        tools::get_tool,
        webhooks::stripe_webhook,
        system::health_handler,
        system::placements_handler,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        FieldError,
        dto::PaginationMeta,
        dto::CheckoutResponse,
        dto::CreateSubmissionRequest,
        dto::SubmissionCreatedResponse,
        dto::SubmissionDto,
        dto::SubmissionListResponse,
        dto::ApproveResponse,
        dto::CreateSponsorshipCheckoutRequest,
        dto::SponsorshipDto,
        dto::ActiveSponsorshipResponse,
        dto::ToolDto,
        dto::ToolListResponse,
        dto::WebhookAck,
        dto::WebhookFailureDto,
        dto::WebhookStatsResponse,
        system::HealthResponse,
        system::PlacementInfo,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Submissions", description = "Public tool submissions"),
        (name = "Admin", description = "Moderation and operations, bearer token required"),
        (name = "Sponsorships", description = "Placement checkout and lookup"),
        (name = "Tools", description = "Public catalog"),
        (name = "Webhooks", description = "Payment provider callbacks"),
        (name = "System", description = "Health and configuration"),
    )
)]
pub struct ApiDoc;
