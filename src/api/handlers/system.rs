//! System endpoints: health check, placement catalog.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::Placement;

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `healthy`.
    pub status: String,
    /// Server time, RFC 3339.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// One purchasable placement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlacementInfo {
    /// Placement name used in checkout requests.
    pub placement: String,
    /// Short description.
    pub description: String,
    /// Whether checkout needs a `toolSlug`.
    pub requires_tool: bool,
    /// Whether a price is configured, i.e. checkout can succeed.
    pub available: bool,
}

fn describe(placement: Placement) -> &'static str {
    match placement {
        Placement::Newsletter => "Sponsor block in the weekly newsletter",
        Placement::FeaturedSpotlight => "Spotlight card on a tool page",
        Placement::SidebarAd => "Sidebar ad next to a tool listing",
    }
}

/// `GET /config/placements`: List sponsorship placements.
#[utoipa::path(
    get,
    path = "/config/placements",
    tag = "System",
    summary = "List sponsorship placements",
    description = "Returns every placement, whether it targets a tool, and whether a price is configured for it.",
    responses(
        (status = 200, description = "Placement catalog", body = Vec<PlacementInfo>),
    )
)]
pub async fn placements_handler(State(state): State<AppState>) -> impl IntoResponse {
    let placements: Vec<PlacementInfo> = Placement::ALL
        .iter()
        .map(|&placement| PlacementInfo {
            placement: placement.to_string(),
            description: describe(placement).to_string(),
            requires_tool: placement.requires_tool(),
            available: state.config.prices.for_placement(placement).is_some(),
        })
        .collect();
    (StatusCode::OK, Json(placements))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/placements", get(placements_handler))
}
