//! Bearer-token guard for the admin endpoints.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use crate::app_state::AppState;
use crate::error::AppError;

/// Extractor that admits a request only when it carries
/// `Authorization: Bearer <ADMIN_API_TOKEN>`.
///
/// With no token configured every admin request is refused.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

/// Compares hashes so the comparison time does not depend on how many
/// leading bytes of the token match.
fn token_matches(expected: &str, presented: &str) -> bool {
    Sha256::digest(expected.as_bytes()) == Sha256::digest(presented.as_bytes())
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_api_token.as_deref() else {
            tracing::warn!("admin request refused: ADMIN_API_TOKEN is not set");
            return Err(AppError::Unauthorized);
        };
        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AppError::Unauthorized)?;
        if token_matches(expected, presented) {
            Ok(Self)
        } else {
            tracing::warn!("admin request refused: wrong token");
            Err(AppError::Unauthorized)
        }
    }
}
