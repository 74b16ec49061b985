//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod sponsorships;
pub mod submissions;
pub mod system;
pub mod tools;
pub mod webhooks;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(submissions::routes())
        .merge(admin::routes())
        .merge(sponsorships::routes())
        .merge(tools::routes())
        .merge(webhooks::routes())
}
