//! In-memory record store.
//!
//! Sessions are serialised behind one owned mutex, which gives each session
//! exclusive, atomic access. Uncommitted sessions restore the snapshot taken
//! when they began. The uniqueness rules mirror the PostgreSQL constraints.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Page, RECENT_FAILURE_LIMIT, RecordSession, RecordStore};
use crate::domain::{
    NewSubmission, NewTool, Placement, Sponsorship, SponsorshipId, SponsorshipStatus,
    SponsorshipUpsert, Submission, SubmissionId, SubmissionStatus, Tool, ToolId, WebhookClaim,
    WebhookEvent, WebhookEventId, WebhookEventStatus, WebhookStats, sponsorship,
};
use crate::error::AppError;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    submissions: Vec<Submission>,
    tools: Vec<Tool>,
    sponsorships: Vec<Sponsorship>,
    webhook_events: Vec<WebhookEvent>,
}

/// Process-local [`RecordStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every sponsorship row, for inspection.
    pub async fn sponsorships(&self) -> Vec<Sponsorship> {
        self.state.lock().await.sponsorships.clone()
    }

    /// Copy of every webhook audit row, for inspection.
    pub async fn webhook_events(&self) -> Vec<WebhookEvent> {
        self.state.lock().await.webhook_events.clone()
    }

    /// Copy of every tool row, for inspection.
    pub async fn tools(&self) -> Vec<Tool> {
        self.state.lock().await.tools.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn RecordSession>, AppError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemorySession {
            state: guard,
            snapshot: Some(snapshot),
        }))
    }
}

#[derive(Debug)]
struct MemorySession {
    state: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.state = snapshot;
        }
    }
}

fn page<T: Clone>(rows: &[T], limit: i64, offset: i64) -> Page<T> {
    let skip = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
    let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    Page {
        items: rows.iter().skip(skip).take(take).cloned().collect(),
        total: rows.len() as u64,
    }
}

#[async_trait]
impl RecordSession for MemorySession {
    async fn insert_submission(&mut self, new: &NewSubmission) -> Result<Submission, AppError> {
        if self.state.submissions.iter().any(|s| s.id == new.id) {
            return Err(AppError::PersistenceError(format!(
                "duplicate submission id {}",
                new.id
            )));
        }
        let now = Utc::now();
        let submission = Submission {
            id: new.id,
            tool_name: new.tool_name.clone(),
            description: new.description.clone(),
            website_url: new.website_url.clone(),
            category: new.category.clone(),
            pricing: new.pricing.clone(),
            email: new.email.clone(),
            tier: new.tier,
            amount_cents: new.amount_cents,
            status: SubmissionStatus::Pending,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };
        self.state.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn submission_for_update(
        &mut self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, AppError> {
        Ok(self.state.submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn set_submission_status(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
        payment_id: Option<&str>,
    ) -> Result<(), AppError> {
        let submission = self
            .state
            .submissions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::SubmissionNotFound(*id.as_uuid()))?;
        submission.status = status;
        if let Some(payment_id) = payment_id {
            submission.payment_id = Some(payment_id.to_string());
        }
        submission.updated_at = Utc::now();
        Ok(())
    }

    async fn list_submissions(
        &mut self,
        status: Option<SubmissionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Submission>, AppError> {
        let mut rows: Vec<Submission> = self
            .state
            .submissions
            .iter()
            .filter(|s| status.is_none_or(|wanted| s.status == wanted))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(&rows, limit, offset))
    }

    async fn tool_by_website_url(&mut self, website_url: &str) -> Result<Option<Tool>, AppError> {
        Ok(self
            .state
            .tools
            .iter()
            .find(|t| t.website_url == website_url)
            .cloned())
    }

    async fn tool_by_source_submission(
        &mut self,
        submission_id: SubmissionId,
    ) -> Result<Option<Tool>, AppError> {
        Ok(self
            .state
            .tools
            .iter()
            .find(|t| t.source_submission_id == Some(submission_id))
            .cloned())
    }

    async fn tool_by_slug(&mut self, slug: &str) -> Result<Option<Tool>, AppError> {
        Ok(self.state.tools.iter().find(|t| t.slug == slug).cloned())
    }

    async fn insert_tool_if_absent(&mut self, new: &NewTool) -> Result<Option<Tool>, AppError> {
        let taken = self
            .state
            .tools
            .iter()
            .any(|t| {
                t.slug == new.slug
                    || t.website_url == new.website_url
                    || t.id == new.id
                    || (new.source_submission_id.is_some()
                        && t.source_submission_id == new.source_submission_id)
            });
        if taken {
            return Ok(None);
        }
        let now = Utc::now();
        let tool = Tool {
            id: new.id,
            slug: new.slug.clone(),
            title: new.title.clone(),
            description: new.description.clone(),
            category: new.category.clone(),
            pricing: new.pricing.clone(),
            website_url: new.website_url.clone(),
            affiliate_url: new.affiliate_url.clone(),
            features: new.features.clone(),
            pros: new.pros.clone(),
            cons: new.cons.clone(),
            color: new.color.clone(),
            gradient: new.gradient.clone(),
            tier: new.tier,
            is_featured: new.is_featured,
            source_submission_id: new.source_submission_id,
            created_at: now,
            updated_at: now,
        };
        self.state.tools.push(tool.clone());
        Ok(Some(tool))
    }

    async fn list_tools(&mut self, limit: i64, offset: i64) -> Result<Page<Tool>, AppError> {
        let mut rows = self.state.tools.clone();
        rows.sort_by(|a, b| {
            b.is_featured
                .cmp(&a.is_featured)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(page(&rows, limit, offset))
    }

    async fn upsert_sponsorship(
        &mut self,
        upsert: &SponsorshipUpsert,
    ) -> Result<(Sponsorship, bool), AppError> {
        let now = Utc::now();
        if let Some(existing) = self
            .state
            .sponsorships
            .iter_mut()
            .find(|s| s.provider_subscription_id == upsert.provider_subscription_id)
        {
            existing.status = upsert.status;
            existing.current_period_end = upsert.current_period_end;
            if upsert.provider_session_id.is_some() {
                existing.provider_session_id.clone_from(&upsert.provider_session_id);
            }
            existing.updated_at = now;
            return Ok((existing.clone(), false));
        }
        let intent = &upsert.intent;
        let row = Sponsorship {
            id: SponsorshipId::new(),
            placement: intent.placement,
            status: upsert.status,
            tool_id: intent.tool_id,
            sponsor_name: intent.sponsor_name.clone(),
            sponsor_url: intent.sponsor_url.clone(),
            sponsor_email: intent.sponsor_email.clone(),
            sponsor_copy: intent.sponsor_copy.clone(),
            current_period_end: upsert.current_period_end,
            provider_subscription_id: upsert.provider_subscription_id.clone(),
            provider_session_id: upsert.provider_session_id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.state.sponsorships.push(row.clone());
        Ok((row, true))
    }

    async fn update_sponsorship_status(
        &mut self,
        provider_subscription_id: &str,
        status: SponsorshipStatus,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<Option<Sponsorship>, AppError> {
        let Some(row) = self
            .state
            .sponsorships
            .iter_mut()
            .find(|s| s.provider_subscription_id == provider_subscription_id)
        else {
            return Ok(None);
        };
        row.status = status;
        if current_period_end.is_some() {
            row.current_period_end = current_period_end;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn active_sponsorship(
        &mut self,
        placement: Placement,
        tool_id: Option<ToolId>,
        now: DateTime<Utc>,
    ) -> Result<Option<Sponsorship>, AppError> {
        let candidates = self
            .state
            .sponsorships
            .iter()
            .filter(|s| s.placement == placement)
            .filter(|s| tool_id.is_none() || s.tool_id == tool_id);
        Ok(sponsorship::pick_active(candidates, now).cloned())
    }

    async fn claim_webhook_event(
        &mut self,
        provider_event_id: &str,
        event_type: &str,
        reclaim_before: DateTime<Utc>,
    ) -> Result<WebhookClaim, AppError> {
        let now = Utc::now();
        let Some(row) = self
            .state
            .webhook_events
            .iter_mut()
            .find(|e| e.provider_event_id == provider_event_id)
        else {
            self.state.webhook_events.push(WebhookEvent {
                id: WebhookEventId::new(),
                provider_event_id: provider_event_id.to_string(),
                event_type: event_type.to_string(),
                status: WebhookEventStatus::Received,
                error: None,
                attempts: 1,
                created_at: now,
                updated_at: now,
            });
            return Ok(WebhookClaim::Claimed { attempt: 1 });
        };

        let reclaimable = match row.status {
            WebhookEventStatus::Processed => return Ok(WebhookClaim::AlreadyProcessed),
            WebhookEventStatus::Failed => true,
            WebhookEventStatus::Received => row.updated_at < reclaim_before,
        };
        if !reclaimable {
            return Ok(WebhookClaim::InFlight);
        }
        row.status = WebhookEventStatus::Received;
        row.attempts = row.attempts.saturating_add(1);
        row.updated_at = now;
        Ok(WebhookClaim::Claimed {
            attempt: row.attempts,
        })
    }

    async fn finish_webhook_event(
        &mut self,
        provider_event_id: &str,
        status: WebhookEventStatus,
        error: Option<&str>,
    ) -> Result<(), AppError> {
        let row = self
            .state
            .webhook_events
            .iter_mut()
            .find(|e| e.provider_event_id == provider_event_id)
            .ok_or_else(|| {
                AppError::PersistenceError(format!("webhook event {provider_event_id} not recorded"))
            })?;
        row.status = status;
        row.error = error.map(str::to_string);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn webhook_stats(&mut self) -> Result<WebhookStats, AppError> {
        let mut stats = WebhookStats::default();
        for event in &self.state.webhook_events {
            match event.status {
                WebhookEventStatus::Received => stats.received += 1,
                WebhookEventStatus::Processed => stats.processed += 1,
                WebhookEventStatus::Failed => stats.failed += 1,
            }
        }
        let mut failures: Vec<WebhookEvent> = self
            .state
            .webhook_events
            .iter()
            .filter(|e| e.status == WebhookEventStatus::Failed)
            .cloned()
            .collect();
        failures.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        failures.truncate(usize::try_from(RECENT_FAILURE_LIMIT).unwrap_or(usize::MAX));
        stats.recent_failures = failures;
        Ok(stats)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let mut session = self;
        session.snapshot = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Tier;

    fn new_submission(url: &str) -> NewSubmission {
        NewSubmission {
            id: SubmissionId::new(),
            tool_name: "Test Tool".to_string(),
            description: "Writes your tests.".to_string(),
            website_url: url.to_string(),
            category: "coding".to_string(),
            pricing: "free".to_string(),
            email: "test@example.com".to_string(),
            tier: Tier::Free,
            amount_cents: 0,
        }
    }

    #[tokio::test]
    async fn dropped_session_rolls_back() {
        let store = MemoryStore::new();
        {
            let Ok(mut session) = store.begin().await else {
                panic!("begin failed");
            };
            let inserted = session.insert_submission(&new_submission("https://a.dev/")).await;
            assert!(inserted.is_ok());
        }
        let Ok(mut session) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(page) = session.list_submissions(None, 10, 0).await else {
            panic!("list failed");
        };
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn committed_session_persists() {
        let store = MemoryStore::new();
        let Ok(mut session) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(submission) = session.insert_submission(&new_submission("https://a.dev/")).await
        else {
            panic!("insert failed");
        };
        assert!(session.commit().await.is_ok());

        let Ok(mut session) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(Some(found)) = session.submission_for_update(submission.id).await else {
            panic!("submission missing after commit");
        };
        assert_eq!(found.status, SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn claim_lifecycle() {
        let store = MemoryStore::new();
        let Ok(mut session) = store.begin().await else {
            panic!("begin failed");
        };
        let past = Utc::now() - chrono::Duration::minutes(10);

        let first = session.claim_webhook_event("evt_1", "x", past).await;
        assert!(matches!(first, Ok(WebhookClaim::Claimed { attempt: 1 })));

        let in_flight = session.claim_webhook_event("evt_1", "x", past).await;
        assert!(matches!(in_flight, Ok(WebhookClaim::InFlight)));

        let failed = session
            .finish_webhook_event("evt_1", WebhookEventStatus::Failed, Some("boom"))
            .await;
        assert!(failed.is_ok());
        let retry = session.claim_webhook_event("evt_1", "x", past).await;
        assert!(matches!(retry, Ok(WebhookClaim::Claimed { attempt: 2 })));

        let done = session
            .finish_webhook_event("evt_1", WebhookEventStatus::Processed, None)
            .await;
        assert!(done.is_ok());
        let dup = session.claim_webhook_event("evt_1", "x", past).await;
        assert!(matches!(dup, Ok(WebhookClaim::AlreadyProcessed)));
    }

    #[tokio::test]
    async fn stale_received_row_is_reclaimed() {
        let store = MemoryStore::new();
        let Ok(mut session) = store.begin().await else {
            panic!("begin failed");
        };
        let past = Utc::now() - chrono::Duration::minutes(10);
        assert!(session.claim_webhook_event("evt_2", "x", past).await.is_ok());

        let future = Utc::now() + chrono::Duration::seconds(1);
        let reclaimed = session.claim_webhook_event("evt_2", "x", future).await;
        assert!(matches!(reclaimed, Ok(WebhookClaim::Claimed { attempt: 2 })));
    }
}
