//! Persistence layer: the record store the core writes through.
//!
//! All reads and writes go through a [`RecordSession`], an explicit unit of
//! work opened with [`RecordStore::begin`]. A session commits atomically or
//! rolls back when dropped. Correctness under concurrency rests on the
//! store's uniqueness guarantees (tool slug, tool website URL, tool source
//! submission, provider
//! subscription reference, provider event id), not on in-process locks.
//!
//! Two implementations exist: [`postgres::PostgresStore`] for production
//! and [`memory::MemoryStore`] for tests and database-less local runs.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    NewSubmission, NewTool, Placement, Sponsorship, SponsorshipStatus, SponsorshipUpsert,
    Submission, SubmissionId, SubmissionStatus, Tool, ToolId, WebhookClaim, WebhookEventStatus,
    WebhookStats,
};
use crate::error::AppError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// How many recent failures [`RecordSession::webhook_stats`] returns.
pub const RECENT_FAILURE_LIMIT: i64 = 20;

/// A page of rows plus the total row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Rows in this page.
    pub items: Vec<T>,
    /// Total number of matching rows.
    pub total: u64,
}

/// Factory for storage sessions.
#[async_trait]
pub trait RecordStore: Send + Sync + fmt::Debug {
    /// Opens a new unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] if the store is unreachable.
    async fn begin(&self) -> Result<Box<dyn RecordSession>, AppError>;
}

/// A unit of work against the record store.
///
/// Writes become visible to other sessions only after [`commit`]. Dropping
/// a session without committing discards its writes.
///
/// Every method returns [`AppError::PersistenceError`] on store failure.
///
/// [`commit`]: RecordSession::commit
#[async_trait]
pub trait RecordSession: Send {
    /// Inserts a new `pending` submission.
    async fn insert_submission(&mut self, new: &NewSubmission) -> Result<Submission, AppError>;

    /// Loads a submission and locks it against concurrent transitions until
    /// the session ends.
    async fn submission_for_update(
        &mut self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, AppError>;

    /// Sets the status of a submission, optionally recording a payment
    /// reference (an existing reference is kept when `payment_id` is `None`).
    async fn set_submission_status(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
        payment_id: Option<&str>,
    ) -> Result<(), AppError>;

    /// Lists submissions, newest first, optionally filtered by status.
    async fn list_submissions(
        &mut self,
        status: Option<SubmissionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Submission>, AppError>;

    /// Finds the tool with exactly this website URL.
    async fn tool_by_website_url(&mut self, website_url: &str) -> Result<Option<Tool>, AppError>;

    /// Finds the tool promoted from this submission.
    async fn tool_by_source_submission(
        &mut self,
        submission_id: SubmissionId,
    ) -> Result<Option<Tool>, AppError>;

    /// Finds the tool with this slug.
    async fn tool_by_slug(&mut self, slug: &str) -> Result<Option<Tool>, AppError>;

    /// Inserts a tool unless its slug, website URL or source submission is
    /// already taken.
    /// Returns `None` on such a conflict instead of failing.
    async fn insert_tool_if_absent(&mut self, new: &NewTool) -> Result<Option<Tool>, AppError>;

    /// Lists tools, featured first, then newest first.
    async fn list_tools(&mut self, limit: i64, offset: i64) -> Result<Page<Tool>, AppError>;

    /// Creates or refreshes the sponsorship for a provider subscription
    /// reference. Returns the row and whether it was newly created.
    async fn upsert_sponsorship(
        &mut self,
        upsert: &SponsorshipUpsert,
    ) -> Result<(Sponsorship, bool), AppError>;

    /// Updates the status (and, when given, the period end) of the
    /// sponsorship with this subscription reference. `None` if unknown.
    async fn update_sponsorship_status(
        &mut self,
        provider_subscription_id: &str,
        status: SponsorshipStatus,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<Option<Sponsorship>, AppError>;

    /// The live sponsorship for a placement (and tool, when given) with the
    /// latest period end.
    async fn active_sponsorship(
        &mut self,
        placement: Placement,
        tool_id: Option<ToolId>,
        now: DateTime<Utc>,
    ) -> Result<Option<Sponsorship>, AppError>;

    /// Atomically records receipt of a provider event.
    ///
    /// A new id is inserted as `received`. An existing `failed` row, or a
    /// `received` row last touched before `reclaim_before`, is reclaimed.
    /// Anything else reports a duplicate.
    async fn claim_webhook_event(
        &mut self,
        provider_event_id: &str,
        event_type: &str,
        reclaim_before: DateTime<Utc>,
    ) -> Result<WebhookClaim, AppError>;

    /// Moves a claimed event to a terminal status.
    async fn finish_webhook_event(
        &mut self,
        provider_event_id: &str,
        status: WebhookEventStatus,
        error: Option<&str>,
    ) -> Result<(), AppError>;

    /// Counts events per status plus the most recent failures.
    async fn webhook_stats(&mut self) -> Result<WebhookStats, AppError>;

    /// Commits every write made through this session.
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
