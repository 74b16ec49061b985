//! Admin handlers: review queue, approval, webhook health.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::auth::AdminAuth;
use crate::api::dto::{
    ApproveResponse, SubmissionDto, SubmissionListParams, SubmissionListResponse,
    WebhookStatsResponse,
};
use crate::app_state::AppState;
use crate::domain::{SubmissionId, SubmissionStatus};
use crate::error::{AppError, ErrorResponse, FieldError};

fn status_filter(raw: Option<&str>) -> Result<Option<SubmissionStatus>, AppError> {
    raw.map(str::parse::<SubmissionStatus>)
        .transpose()
        .map_err(|_| {
            AppError::Validation(vec![FieldError::new(
                "status",
                "must be one of pending, approved, failed",
            )])
        })
}

/// `GET /admin/submissions`: List submissions for review.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] without a valid admin token and
/// [`AppError::Validation`] for an unknown status filter.
#[utoipa::path(
    get,
    path = "/api/v1/admin/submissions",
    tag = "Admin",
    summary = "List submissions",
    description = "Returns submissions newest first, optionally filtered by status.",
    params(SubmissionListParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Paginated submission list", body = SubmissionListResponse),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 401, description = "Missing or wrong admin token", body = ErrorResponse),
    )
)]
pub async fn list_submissions(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Query(params): Query<SubmissionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let status = status_filter(params.status.as_deref())?;
    let pagination = params.pagination();
    let page = state
        .moderation
        .list(status, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(SubmissionListResponse {
        data: page.items.into_iter().map(SubmissionDto::from).collect(),
        pagination: pagination.meta(page.total),
    }))
}

/// `POST /admin/submissions/{id}/approve`: Approve and list a submission.
///
/// # Errors
///
/// Returns [`AppError::SubmissionNotFound`] for an unknown id and
/// [`AppError::InvalidRequest`] for a submission whose payment failed.
#[utoipa::path(
    post,
    path = "/api/v1/admin/submissions/{id}/approve",
    tag = "Admin",
    summary = "Approve a submission",
    description = "Promotes the submission into a public tool and marks it approved. Approving twice returns the same tool.",
    params(
        ("id" = uuid::Uuid, Path, description = "Submission UUID"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Submission approved", body = ApproveResponse),
        (status = 400, description = "Submission cannot be approved", body = ErrorResponse),
        (status = 401, description = "Missing or wrong admin token", body = ErrorResponse),
        (status = 404, description = "Submission not found", body = ErrorResponse),
    )
)]
pub async fn approve_submission(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let approval = state.moderation.approve(SubmissionId::from_uuid(id)).await?;
    Ok(Json(ApproveResponse::from(approval)))
}

/// `GET /admin/webhooks/stats`: Webhook reconciliation health.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] without a valid admin token.
#[utoipa::path(
    get,
    path = "/api/v1/admin/webhooks/stats",
    tag = "Admin",
    summary = "Webhook statistics",
    description = "Counts recorded provider events per status and lists the most recent failures.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Reconciliation statistics", body = WebhookStatsResponse),
        (status = 401, description = "Missing or wrong admin token", body = ErrorResponse),
    )
)]
pub async fn webhook_stats(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.reconciliation.stats().await?;
    Ok(Json(WebhookStatsResponse::from(stats)))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/submissions", get(list_submissions))
        .route("/admin/submissions/{id}/approve", post(approve_submission))
        .route("/admin/webhooks/stats", get(webhook_stats))
}
