//! Submission moderation: approval and the admin review queue.

use std::sync::Arc;

use chrono::Utc;

use super::promotion::{existing_tool, promote};
use crate::domain::{
    DirectoryEvent, EventBus, Submission, SubmissionId, SubmissionStatus, Tool,
};
use crate::error::AppError;
use crate::persistence::{Page, RecordSession, RecordStore};

/// Who is approving a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalSource<'a> {
    /// An administrator. Only `pending` submissions qualify.
    Admin,
    /// A confirmed payment. A submission whose earlier payment attempt
    /// failed qualifies too; the payment reference is recorded.
    Payment {
        /// Provider payment reference.
        payment_id: &'a str,
    },
}

/// Result of an approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    /// Submission after the transition.
    pub submission: Submission,
    /// Tool it is listed as.
    pub tool: Tool,
    /// False when the submission was already approved and nothing changed.
    pub newly_approved: bool,
}

impl Approval {
    /// Event to publish once the session has committed, if any.
    #[must_use]
    pub fn event(&self) -> Option<DirectoryEvent> {
        self.newly_approved.then(|| DirectoryEvent::SubmissionApproved {
            submission_id: self.submission.id,
            tool_id: self.tool.id,
            tool_slug: self.tool.slug.clone(),
            tool_name: self.submission.tool_name.clone(),
            email: self.submission.email.clone(),
            tier: self.submission.tier,
            timestamp: Utc::now(),
        })
    }
}

/// Approves a submission inside the caller's session: lock it, promote it,
/// flip its status. Approving an approved submission returns its tool and
/// changes nothing.
///
/// # Errors
///
/// - [`AppError::SubmissionNotFound`] for an unknown id.
/// - [`AppError::InvalidRequest`] when an admin approves a submission whose
///   payment failed.
/// - [`AppError::PersistenceError`] on store failure.
pub async fn approve_in_session(
    session: &mut dyn RecordSession,
    id: SubmissionId,
    source: ApprovalSource<'_>,
) -> Result<Approval, AppError> {
    let mut submission = session
        .submission_for_update(id)
        .await?
        .ok_or(AppError::SubmissionNotFound(*id.as_uuid()))?;

    match (submission.status, source) {
        (SubmissionStatus::Approved, _) => {
            let tool = existing_tool(session, &submission).await?.ok_or_else(|| {
                AppError::Internal(format!("approved submission {id} has no listed tool"))
            })?;
            return Ok(Approval {
                submission,
                tool,
                newly_approved: false,
            });
        }
        (SubmissionStatus::Failed, ApprovalSource::Admin) => {
            return Err(AppError::InvalidRequest(format!(
                "submission {id} has a failed payment and cannot be approved"
            )));
        }
        _ => {}
    }

    let tool = promote(session, &submission).await?;
    let payment_id = match source {
        ApprovalSource::Admin => None,
        ApprovalSource::Payment { payment_id } => Some(payment_id),
    };
    session
        .set_submission_status(id, SubmissionStatus::Approved, payment_id)
        .await?;
    submission.status = SubmissionStatus::Approved;
    if let Some(payment_id) = payment_id {
        submission.payment_id = Some(payment_id.to_string());
    }
    tracing::info!(
        submission_id = %id,
        tool_id = %tool.id,
        slug = %tool.slug,
        paid = payment_id.is_some(),
        "submission approved"
    );
    Ok(Approval {
        submission,
        tool,
        newly_approved: true,
    })
}

/// Admin-facing moderation operations.
#[derive(Debug, Clone)]
pub struct ModerationService {
    store: Arc<dyn RecordStore>,
    event_bus: EventBus,
}

impl ModerationService {
    /// Creates a new `ModerationService`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Approves a pending submission and publishes `SubmissionApproved`
    /// after commit. Idempotent.
    ///
    /// # Errors
    ///
    /// See [`approve_in_session`].
    pub async fn approve(&self, id: SubmissionId) -> Result<Approval, AppError> {
        let mut session = self.store.begin().await?;
        let approval = approve_in_session(session.as_mut(), id, ApprovalSource::Admin).await?;
        session.commit().await?;
        if let Some(event) = approval.event() {
            self.event_bus.publish(event);
        }
        Ok(approval)
    }

    /// Lists submissions, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on store failure.
    pub async fn list(
        &self,
        status: Option<SubmissionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Submission>, AppError> {
        let mut session = self.store.begin().await?;
        session.list_submissions(status, limit, offset).await
    }
}
