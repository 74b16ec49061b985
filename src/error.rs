//! Service error types with HTTP status code mapping.
//!
//! [`AppError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Abuse and upstream failures deliberately collapse to generic messages so
//! callers learn nothing about which check fired or which dependency broke.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::payments::{PaymentError, SignatureError};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "validation failed",
///     "details": [{ "field": "toolName", "message": "must be 2-100 characters" }]
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`AppError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Field-level validation failures, present only for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    /// JSON path of the offending field (e.g. `"toolName"`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category             | HTTP Status                  |
/// |-----------|----------------------|------------------------------|
/// | 1000–1999 | Validation / request | 400 Bad Request              |
/// | 2000–2999 | Not Found / Auth     | 404 Not Found / 401          |
/// | 3000–3999 | Server               | 500 Internal Server Error    |
/// | 4000–4999 | Upstream             | 502 Bad Gateway              |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Schema validation failed; carries one entry per violated field.
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// Request was rejected by an anti-abuse check (size limit, honeypot).
    #[error("submission rejected")]
    Rejected,

    /// Request was malformed in a way that is not field-specific.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Webhook signature header was missing, stale or did not match.
    #[error("invalid webhook signature")]
    InvalidSignature(#[from] SignatureError),

    /// Submission with the given ID was not found.
    #[error("submission not found: {0}")]
    SubmissionNotFound(uuid::Uuid),

    /// Tool with the given slug was not found.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Missing or wrong administrative credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// A required setting (price id, provider key) is not configured.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Record store failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Payment provider call failed.
    #[error("payment provider error: {0}")]
    Payment(#[source] PaymentError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::Rejected => 1002,
            Self::InvalidRequest(_) => 1003,
            Self::InvalidSignature(_) => 1004,
            Self::SubmissionNotFound(_) => 2001,
            Self::ToolNotFound(_) => 2002,
            Self::Unauthorized => 2401,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::NotConfigured(_) => 3002,
            Self::Payment(_) => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Rejected
            | Self::InvalidRequest(_)
            | Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::SubmissionNotFound(_) | Self::ToolNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PersistenceError(_) | Self::NotConfigured(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether a webhook that failed with this error should be redelivered
    /// by the provider rather than acknowledged.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::Payment(_))
    }

    /// Message shown to the caller. Server and upstream failures are
    /// replaced by a generic text; the full error is logged instead.
    fn public_message(&self) -> String {
        match self {
            Self::PersistenceError(_) | Self::Internal(_) | Self::NotConfigured(_) => {
                "internal server error".to_string()
            }
            Self::Payment(_) => "payment provider unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::PersistenceError(e.to_string())
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::NotConfigured => Self::NotConfigured("payment provider".to_string()),
            other => Self::Payment(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let code = self.error_code();
        let message = self.public_message();
        let details = match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
