//! Public catalog handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{PaginationParams, ToolDto, ToolListResponse};
use crate::app_state::AppState;
use crate::error::{AppError, ErrorResponse};

/// `GET /tools`: List listed tools.
///
/// # Errors
///
/// Returns [`AppError::PersistenceError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/tools",
    tag = "Tools",
    summary = "List tools",
    description = "Returns a paginated list of listed tools, featured first, then newest first.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated tool list", body = ToolListResponse),
    )
)]
pub async fn list_tools(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    let params = params.clamped();
    let page = state
        .catalog
        .list_tools(params.limit(), params.offset())
        .await?;
    Ok(Json(ToolListResponse {
        data: page.items.into_iter().map(ToolDto::from).collect(),
        pagination: params.meta(page.total),
    }))
}

/// `GET /tools/{slug}`: Get one tool.
///
/// # Errors
///
/// Returns [`AppError::ToolNotFound`] for an unknown slug.
#[utoipa::path(
    get,
    path = "/api/v1/tools/{slug}",
    tag = "Tools",
    summary = "Get tool",
    params(
        ("slug" = String, Path, description = "Tool slug"),
    ),
    responses(
        (status = 200, description = "Tool details", body = ToolDto),
        (status = 404, description = "Tool not found", body = ErrorResponse),
    )
)]
pub async fn get_tool(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tool = state.catalog.tool_by_slug(&slug).await?;
    Ok(Json(ToolDto::from(tool)))
}

/// Catalog routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/{slug}", get(get_tool))
}
