//! PostgreSQL implementation of the persistence layer.
//!
//! A [`PgSession`] wraps one `sqlx` transaction. Uniqueness races are
//! resolved by the table constraints declared in `migrations/`: inserts use
//! `ON CONFLICT` so a lost race surfaces as "no row returned" instead of an
//! error.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{
    SponsorshipRow, SubmissionRow, ToolRow, UpsertedSponsorshipRow, WebhookEventRow,
};
use super::{Page, RECENT_FAILURE_LIMIT, RecordSession, RecordStore};
use crate::config::AppConfig;
use crate::domain::{
    NewSubmission, NewTool, Placement, Sponsorship, SponsorshipId, SponsorshipStatus,
    SponsorshipUpsert, Submission, SubmissionId, SubmissionStatus, Tool, ToolId, WebhookClaim,
    WebhookEvent, WebhookEventId, WebhookEventStatus, WebhookStats,
};
use crate::error::AppError;

const SUBMISSION_COLUMNS: &str = "id, tool_name, description, website_url, category, pricing, \
     email, tier, amount_cents, status, payment_id, created_at, updated_at";

const TOOL_COLUMNS: &str = "id, slug, title, description, category, pricing, website_url, \
     affiliate_url, features, pros, cons, color, gradient, tier, is_featured, \
     source_submission_id, created_at, updated_at";

const SPONSORSHIP_COLUMNS: &str = "id, placement, status, tool_id, sponsor_name, sponsor_url, \
     sponsor_email, sponsor_copy, current_period_end, provider_subscription_id, \
     provider_session_id, created_at, updated_at";

const WEBHOOK_COLUMNS: &str =
    "id, provider_event_id, event_type, status, error, attempts, created_at, updated_at";

/// PostgreSQL-backed [`RecordStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] if the database is unreachable.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations in `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| AppError::PersistenceError(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn RecordSession>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }
}

/// One open transaction. Rolled back by `sqlx` when dropped uncommitted.
struct PgSession {
    tx: Transaction<'static, Postgres>,
}

impl fmt::Debug for PgSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSession").finish_non_exhaustive()
    }
}

fn total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[async_trait]
impl RecordSession for PgSession {
    async fn insert_submission(&mut self, new: &NewSubmission) -> Result<Submission, AppError> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "INSERT INTO submissions \
             (id, tool_name, description, website_url, category, pricing, email, tier, \
              amount_cents, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending') \
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(new.id.as_uuid())
        .bind(&new.tool_name)
        .bind(&new.description)
        .bind(&new.website_url)
        .bind(&new.category)
        .bind(&new.pricing)
        .bind(&new.email)
        .bind(new.tier.as_str())
        .bind(new.amount_cents)
        .fetch_one(&mut *self.tx)
        .await?;
        Submission::try_from(row)
    }

    async fn submission_for_update(
        &mut self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, AppError> {
        sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Submission::try_from)
        .transpose()
    }

    async fn set_submission_status(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
        payment_id: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE submissions \
             SET status = $2, payment_id = COALESCE($3, payment_id), updated_at = now() \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(payment_id)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::SubmissionNotFound(*id.as_uuid()));
        }
        Ok(())
    }

    async fn list_submissions(
        &mut self,
        status: Option<SubmissionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Submission>, AppError> {
        let status = status.map(SubmissionStatus::as_str);
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM submissions WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await?;
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(Page {
            items: rows
                .into_iter()
                .map(Submission::try_from)
                .collect::<Result<_, _>>()?,
            total: total(count),
        })
    }

    async fn tool_by_website_url(&mut self, website_url: &str) -> Result<Option<Tool>, AppError> {
        sqlx::query_as::<_, ToolRow>(&format!(
            "SELECT {TOOL_COLUMNS} FROM tools WHERE website_url = $1"
        ))
        .bind(website_url)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Tool::try_from)
        .transpose()
    }

    async fn tool_by_source_submission(
        &mut self,
        submission_id: SubmissionId,
    ) -> Result<Option<Tool>, AppError> {
        sqlx::query_as::<_, ToolRow>(&format!(
            "SELECT {TOOL_COLUMNS} FROM tools WHERE source_submission_id = $1"
        ))
        .bind(submission_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Tool::try_from)
        .transpose()
    }

    async fn tool_by_slug(&mut self, slug: &str) -> Result<Option<Tool>, AppError> {
        sqlx::query_as::<_, ToolRow>(&format!("SELECT {TOOL_COLUMNS} FROM tools WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Tool::try_from)
            .transpose()
    }

    async fn insert_tool_if_absent(&mut self, new: &NewTool) -> Result<Option<Tool>, AppError> {
        sqlx::query_as::<_, ToolRow>(&format!(
            "INSERT INTO tools \
             (id, slug, title, description, category, pricing, website_url, affiliate_url, \
              features, pros, cons, color, gradient, tier, is_featured, source_submission_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             ON CONFLICT DO NOTHING \
             RETURNING {TOOL_COLUMNS}"
        ))
        .bind(new.id.as_uuid())
        .bind(&new.slug)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.category)
        .bind(&new.pricing)
        .bind(&new.website_url)
        .bind(new.affiliate_url.as_deref())
        .bind(&new.features)
        .bind(&new.pros)
        .bind(&new.cons)
        .bind(&new.color)
        .bind(&new.gradient)
        .bind(new.tier.as_str())
        .bind(new.is_featured)
        .bind(new.source_submission_id.map(|id| *id.as_uuid()))
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Tool::try_from)
        .transpose()
    }

    async fn list_tools(&mut self, limit: i64, offset: i64) -> Result<Page<Tool>, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tools")
            .fetch_one(&mut *self.tx)
            .await?;
        let rows = sqlx::query_as::<_, ToolRow>(&format!(
            "SELECT {TOOL_COLUMNS} FROM tools \
             ORDER BY is_featured DESC, created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(Page {
            items: rows.into_iter().map(Tool::try_from).collect::<Result<_, _>>()?,
            total: total(count),
        })
    }

    async fn upsert_sponsorship(
        &mut self,
        upsert: &SponsorshipUpsert,
    ) -> Result<(Sponsorship, bool), AppError> {
        // `xmax = 0` holds only for a freshly inserted tuple.
        let intent = &upsert.intent;
        let upserted = sqlx::query_as::<_, UpsertedSponsorshipRow>(&format!(
            "INSERT INTO sponsorships AS s \
             (id, placement, status, tool_id, sponsor_name, sponsor_url, sponsor_email, \
              sponsor_copy, current_period_end, provider_subscription_id, provider_session_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (provider_subscription_id) DO UPDATE SET \
               status = EXCLUDED.status, \
               current_period_end = EXCLUDED.current_period_end, \
               provider_session_id = COALESCE(EXCLUDED.provider_session_id, s.provider_session_id), \
               updated_at = now() \
             RETURNING {SPONSORSHIP_COLUMNS}, (xmax = 0) AS created"
        ))
        .bind(*SponsorshipId::new().as_uuid())
        .bind(intent.placement.as_str())
        .bind(upsert.status.as_str())
        .bind(intent.tool_id.map(|id| *id.as_uuid()))
        .bind(intent.sponsor_name.as_deref())
        .bind(intent.sponsor_url.as_deref())
        .bind(intent.sponsor_email.as_deref())
        .bind(intent.sponsor_copy.as_deref())
        .bind(upsert.current_period_end)
        .bind(&upsert.provider_subscription_id)
        .bind(upsert.provider_session_id.as_deref())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok((Sponsorship::try_from(upserted.row)?, upserted.created))
    }

    async fn update_sponsorship_status(
        &mut self,
        provider_subscription_id: &str,
        status: SponsorshipStatus,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<Option<Sponsorship>, AppError> {
        sqlx::query_as::<_, SponsorshipRow>(&format!(
            "UPDATE sponsorships \
             SET status = $2, current_period_end = COALESCE($3, current_period_end), \
                 updated_at = now() \
             WHERE provider_subscription_id = $1 \
             RETURNING {SPONSORSHIP_COLUMNS}"
        ))
        .bind(provider_subscription_id)
        .bind(status.as_str())
        .bind(current_period_end)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Sponsorship::try_from)
        .transpose()
    }

    async fn active_sponsorship(
        &mut self,
        placement: Placement,
        tool_id: Option<ToolId>,
        now: DateTime<Utc>,
    ) -> Result<Option<Sponsorship>, AppError> {
        sqlx::query_as::<_, SponsorshipRow>(&format!(
            "SELECT {SPONSORSHIP_COLUMNS} FROM sponsorships \
             WHERE placement = $1 AND ($2::uuid IS NULL OR tool_id = $2) \
               AND status = 'active' AND current_period_end > $3 \
             ORDER BY current_period_end DESC LIMIT 1"
        ))
        .bind(placement.as_str())
        .bind(tool_id.map(|id| *id.as_uuid()))
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Sponsorship::try_from)
        .transpose()
    }

    async fn claim_webhook_event(
        &mut self,
        provider_event_id: &str,
        event_type: &str,
        reclaim_before: DateTime<Utc>,
    ) -> Result<WebhookClaim, AppError> {
        let attempt = sqlx::query_scalar::<_, i32>(
            "INSERT INTO webhook_events (id, provider_event_id, event_type, status, attempts) \
             VALUES ($1, $2, $3, 'received', 1) \
             ON CONFLICT (provider_event_id) DO UPDATE SET \
               status = 'received', \
               attempts = webhook_events.attempts + 1, \
               updated_at = now() \
             WHERE webhook_events.status = 'failed' \
                OR (webhook_events.status = 'received' AND webhook_events.updated_at < $4) \
             RETURNING attempts",
        )
        .bind(*WebhookEventId::new().as_uuid())
        .bind(provider_event_id)
        .bind(event_type)
        .bind(reclaim_before)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(attempt) = attempt {
            return Ok(WebhookClaim::Claimed { attempt });
        }

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM webhook_events WHERE provider_event_id = $1",
        )
        .bind(provider_event_id)
        .fetch_one(&mut *self.tx)
        .await?;
        if status == WebhookEventStatus::Processed.as_str() {
            Ok(WebhookClaim::AlreadyProcessed)
        } else {
            Ok(WebhookClaim::InFlight)
        }
    }

    async fn finish_webhook_event(
        &mut self,
        provider_event_id: &str,
        status: WebhookEventStatus,
        error: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE webhook_events SET status = $2, error = $3, updated_at = now() \
             WHERE provider_event_id = $1",
        )
        .bind(provider_event_id)
        .bind(status.as_str())
        .bind(error)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::PersistenceError(format!(
                "webhook event {provider_event_id} not recorded"
            )));
        }
        Ok(())
    }

    async fn webhook_stats(&mut self) -> Result<WebhookStats, AppError> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM webhook_events GROUP BY status",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        let mut stats = WebhookStats::default();
        for (status, count) in counts {
            match status.parse::<WebhookEventStatus>() {
                Ok(WebhookEventStatus::Received) => stats.received = total(count),
                Ok(WebhookEventStatus::Processed) => stats.processed = total(count),
                Ok(WebhookEventStatus::Failed) => stats.failed = total(count),
                Err(e) => return Err(AppError::PersistenceError(e)),
            }
        }
        let failures = sqlx::query_as::<_, WebhookEventRow>(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhook_events WHERE status = 'failed' \
             ORDER BY updated_at DESC LIMIT $1"
        ))
        .bind(RECENT_FAILURE_LIMIT)
        .fetch_all(&mut *self.tx)
        .await?;
        stats.recent_failures = failures
            .into_iter()
            .map(WebhookEvent::try_from)
            .collect::<Result<_, _>>()?;
        Ok(stats)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let session = *self;
        session.tx.commit().await?;
        Ok(())
    }
}

