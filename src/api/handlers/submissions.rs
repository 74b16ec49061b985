//! Public submission handlers: intake and paid-tier checkout.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CheckoutResponse, CreateSubmissionRequest, SubmissionCreatedResponse};
use crate::app_state::AppState;
use crate::domain::{SubmissionId, SubmissionStatus};
use crate::error::{AppError, ErrorResponse};

/// The `Origin` request header, if present and readable.
pub(crate) fn origin(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::ORIGIN).and_then(|v| v.to_str().ok())
}

/// Bodies over the transport limit get the same answer as any other
/// oversized submission.
fn body_rejection(rejection: BytesRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!("submission rejected: body over transport limit");
        AppError::Rejected
    } else {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// `POST /submissions`: Submit a tool for listing.
///
/// # Errors
///
/// Returns [`AppError::Rejected`], [`AppError::InvalidRequest`] or
/// [`AppError::Validation`] for unacceptable bodies.
#[utoipa::path(
    post,
    path = "/api/v1/submissions",
    tag = "Submissions",
    summary = "Submit a tool",
    description = "Validates an untrusted listing request and stores it as a pending submission. Oversized bodies and filled honeypots get the same generic rejection.",
    request_body = CreateSubmissionRequest,
    responses(
        (status = 201, description = "Submission stored", body = SubmissionCreatedResponse),
        (status = 400, description = "Validation failed or submission rejected", body = ErrorResponse),
    )
)]
pub async fn create_submission(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = body.map_err(body_rejection)?;
    let id = state.intake.submit(&body).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmissionCreatedResponse {
            id: *id.as_uuid(),
            status: SubmissionStatus::Pending.to_string(),
        }),
    ))
}

/// `POST /submissions/{id}/checkout`: Pay for a priority or premium listing.
///
/// # Errors
///
/// Returns [`AppError::SubmissionNotFound`] for an unknown id and
/// [`AppError::InvalidRequest`] for free or already decided submissions.
#[utoipa::path(
    post,
    path = "/api/v1/submissions/{id}/checkout",
    tag = "Submissions",
    summary = "Start submission payment",
    description = "Creates a one-time payment checkout for a pending paid-tier submission. The submission is approved when the provider confirms payment.",
    params(
        ("id" = uuid::Uuid, Path, description = "Submission UUID"),
    ),
    responses(
        (status = 200, description = "Checkout created", body = CheckoutResponse),
        (status = 400, description = "Submission cannot be paid for", body = ErrorResponse),
        (status = 404, description = "Submission not found", body = ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = ErrorResponse),
    )
)]
pub async fn create_submission_checkout(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .checkout
        .create_submission_checkout(SubmissionId::from_uuid(id), origin(&headers))
        .await?;
    Ok(Json(CheckoutResponse::from(session)))
}

/// Submission routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/submissions", post(create_submission))
        .route("/submissions/{id}/checkout", post(create_submission_checkout))
}
