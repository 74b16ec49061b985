//! Submission intake: abuse checks, validation, and the pending insert.

use std::sync::Arc;

use crate::domain::{SubmissionId, SubmissionPayload};
use crate::error::AppError;
use crate::persistence::RecordStore;

/// Accepts untrusted submissions from the public form.
#[derive(Debug, Clone)]
pub struct IntakeService {
    store: Arc<dyn RecordStore>,
    max_body_bytes: usize,
}

impl IntakeService {
    /// Creates an intake service that rejects bodies over `max_body_bytes`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, max_body_bytes: usize) -> Self {
        Self {
            store,
            max_body_bytes,
        }
    }

    /// Validates a raw request body and stores it as a `pending` submission.
    ///
    /// Checks run in order: body size, JSON syntax, honeypot, field rules.
    /// Size and honeypot failures are indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// - [`AppError::Rejected`] for an oversized body or a filled honeypot.
    /// - [`AppError::InvalidRequest`] for a body that is not a JSON object of
    ///   the expected shape.
    /// - [`AppError::Validation`] with one entry per invalid field.
    /// - [`AppError::PersistenceError`] if the insert fails.
    pub async fn submit(&self, body: &[u8]) -> Result<SubmissionId, AppError> {
        if body.len() > self.max_body_bytes {
            tracing::warn!(
                size = body.len(),
                limit = self.max_body_bytes,
                "submission rejected: body too large"
            );
            return Err(AppError::Rejected);
        }

        let payload: SubmissionPayload = serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidRequest(format!("malformed submission body: {e}")))?;

        if payload.honeypot_tripped() {
            tracing::warn!("submission rejected: honeypot filled");
            return Err(AppError::Rejected);
        }

        let new = payload.validate().map_err(|errors| {
            tracing::debug!(fields = errors.len(), "submission failed validation");
            AppError::Validation(errors)
        })?;

        let mut session = self.store.begin().await?;
        let submission = session.insert_submission(&new).await?;
        session.commit().await?;

        tracing::info!(
            submission_id = %submission.id,
            tier = %submission.tier,
            "submission received"
        );
        Ok(submission.id)
    }
}
