//! Sponsorship handlers: checkout and live placement lookup.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::submissions::origin;
use crate::api::dto::{
    ActiveSponsorshipParams, ActiveSponsorshipResponse, CheckoutResponse,
    CreateSponsorshipCheckoutRequest, SponsorshipDto,
};
use crate::app_state::AppState;
use crate::domain::Placement;
use crate::error::{AppError, ErrorResponse, FieldError};
use crate::service::SponsorshipCheckout;

/// `POST /sponsorships/checkout`: Buy a placement.
///
/// # Errors
///
/// Returns [`AppError::Validation`] for bad sponsor fields,
/// [`AppError::ToolNotFound`] for an unknown tool and [`AppError::Payment`]
/// when the provider is unavailable.
#[utoipa::path(
    post,
    path = "/api/v1/sponsorships/checkout",
    tag = "Sponsorships",
    summary = "Create sponsorship checkout",
    description = "Creates a subscription checkout for a placement. Nothing is stored until the provider confirms payment through the webhook.",
    request_body = CreateSponsorshipCheckoutRequest,
    responses(
        (status = 200, description = "Checkout created", body = CheckoutResponse),
        (status = 400, description = "Invalid sponsorship request", body = ErrorResponse),
        (status = 404, description = "Tool not found", body = ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = ErrorResponse),
    )
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateSponsorshipCheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let request = SponsorshipCheckout::from(req);
    let session = state
        .checkout
        .create_sponsorship_checkout(&request, origin(&headers))
        .await?;
    Ok(Json(CheckoutResponse::from(session)))
}

/// `GET /sponsorships/active`: The sponsor currently shown in a placement.
///
/// # Errors
///
/// Returns [`AppError::Validation`] for an unknown placement and
/// [`AppError::ToolNotFound`] for an unknown tool.
#[utoipa::path(
    get,
    path = "/api/v1/sponsorships/active",
    tag = "Sponsorships",
    summary = "Active sponsorship",
    description = "Returns the live sponsorship with the latest period end for a placement, or null.",
    params(ActiveSponsorshipParams),
    responses(
        (status = 200, description = "Active sponsorship or null", body = ActiveSponsorshipResponse),
        (status = 400, description = "Unknown placement or missing toolSlug", body = ErrorResponse),
        (status = 404, description = "Tool not found", body = ErrorResponse),
    )
)]
pub async fn active_sponsorship(
    State(state): State<AppState>,
    Query(params): Query<ActiveSponsorshipParams>,
) -> Result<impl IntoResponse, AppError> {
    let placement = params.placement.parse::<Placement>().map_err(|_| {
        AppError::Validation(vec![FieldError::new(
            "placement",
            "must be one of newsletter, featured_spotlight, sidebar_ad",
        )])
    })?;
    let sponsorship = state
        .catalog
        .active_sponsorship(placement, params.tool_slug.as_deref())
        .await?;
    Ok(Json(ActiveSponsorshipResponse {
        sponsorship: sponsorship.map(SponsorshipDto::from),
    }))
}

/// Sponsorship routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sponsorships/checkout", post(create_checkout))
        .route("/sponsorships/active", get(active_sponsorship))
}
