//! Payment provider webhook endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::WebhookAck;
use crate::app_state::AppState;
use crate::error::{AppError, ErrorResponse};

/// Header carrying `t=<unix>,v1=<hex>`.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// `POST /webhooks/stripe`: Receive a provider event.
///
/// The raw body is verified before it is parsed.
///
/// # Errors
///
/// Returns [`AppError::InvalidSignature`] or [`AppError::InvalidRequest`]
/// for unauthenticated or malformed deliveries, and a 5xx error when the
/// event should be redelivered.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/stripe",
    tag = "Webhooks",
    summary = "Receive provider webhook",
    description = "Verifies the signature, records the event once by provider id and applies it. Duplicates and events that cannot be applied are acknowledged with 200; storage or provider outages return 500 so the provider retries.",
    request_body(content = String, description = "Raw provider event JSON", content_type = "application/json"),
    params(
        ("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac-sha256>"),
    ),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Bad signature or payload", body = ErrorResponse),
        (status = 500, description = "Transient failure, retry later", body = ErrorResponse),
    )
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = state.reconciliation.reconcile(&body, signature).await?;
    Ok(Json(WebhookAck::from(outcome)))
}

/// Webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/stripe", post(stripe_webhook))
}
