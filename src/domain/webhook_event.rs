//! Audit and idempotency records for received provider events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::WebhookEventId;

/// Processing status of a stored provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    /// Claimed; side effects in progress (or the handler died).
    Received,
    /// Side effects applied. Redeliveries are skipped.
    Processed,
    /// Handling failed; a redelivery may reclaim it.
    Failed,
}

impl WebhookEventStatus {
    /// Stable lowercase name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WebhookEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(Self::Received),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown webhook event status: {other}")),
        }
    }
}

/// A stored webhook audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookEvent {
    /// Row identity.
    pub id: WebhookEventId,
    /// Provider-assigned event id; unique.
    pub provider_event_id: String,
    /// Provider event type (e.g. `checkout.session.completed`).
    pub event_type: String,
    /// Processing status.
    pub status: WebhookEventStatus,
    /// Error text of the last failed attempt.
    pub error: Option<String>,
    /// Number of times the event was claimed for processing.
    pub attempts: i32,
    /// First receipt.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

/// Result of atomically recording an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookClaim {
    /// This delivery owns processing (first receipt, or a reclaim of a
    /// failed or stale row). Carries the attempt number.
    Claimed {
        /// 1 for the first receipt, incremented on every reclaim.
        attempt: i32,
    },
    /// Already applied; do nothing.
    AlreadyProcessed,
    /// Another delivery is processing it right now.
    InFlight,
}

/// Reconciliation statistics for operators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebhookStats {
    /// Rows still `received`.
    pub received: u64,
    /// Rows `processed`.
    pub processed: u64,
    /// Rows `failed`.
    pub failed: u64,
    /// Most recent failures, newest first.
    pub recent_failures: Vec<WebhookEvent>,
}
