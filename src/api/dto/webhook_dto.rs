//! Webhook acknowledgement and reconciliation statistics DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{WebhookEvent, WebhookStats};
use crate::service::ReconcileOutcome;

/// Response body for `POST /webhooks/stripe`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    /// Always true; the event will not be redelivered.
    pub received: bool,
    /// `processed`, `ignored`, `duplicate`, `in_flight` or `failed`.
    pub outcome: String,
    /// Error text for a `failed` outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ReconcileOutcome> for WebhookAck {
    fn from(outcome: ReconcileOutcome) -> Self {
        let (outcome, error) = match outcome {
            ReconcileOutcome::Processed => ("processed", None),
            ReconcileOutcome::Ignored => ("ignored", None),
            ReconcileOutcome::Duplicate => ("duplicate", None),
            ReconcileOutcome::InFlight => ("in_flight", None),
            ReconcileOutcome::Failed { error } => ("failed", Some(error)),
        };
        Self {
            received: true,
            outcome: outcome.to_string(),
            error,
        }
    }
}

/// A failed webhook row.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookFailureDto {
    /// Provider event id.
    pub event_id: String,
    /// Provider event type.
    pub event_type: String,
    /// Captured error.
    pub error: Option<String>,
    /// Processing attempts so far.
    pub attempts: i32,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}

impl From<WebhookEvent> for WebhookFailureDto {
    fn from(e: WebhookEvent) -> Self {
        Self {
            event_id: e.provider_event_id,
            event_type: e.event_type,
            error: e.error,
            attempts: e.attempts,
            updated_at: e.updated_at,
        }
    }
}

/// Response body for `GET /admin/webhooks/stats`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatsResponse {
    /// Events still being processed or abandoned mid-way.
    pub received: u64,
    /// Events applied.
    pub processed: u64,
    /// Events that failed.
    pub failed: u64,
    /// Most recent failures, newest first.
    pub recent_failures: Vec<WebhookFailureDto>,
}

impl From<WebhookStats> for WebhookStatsResponse {
    fn from(stats: WebhookStats) -> Self {
        Self {
            received: stats.received,
            processed: stats.processed,
            failed: stats.failed,
            recent_failures: stats
                .recent_failures
                .into_iter()
                .map(WebhookFailureDto::from)
                .collect(),
        }
    }
}
