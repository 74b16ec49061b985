//! Webhook reconciliation: turns verified provider events into local state.
//!
//! # Flow
//!
//! 1. Verify the signature header against the raw body.
//! 2. Decode the body once into a [`ProviderEvent`].
//! 3. Claim the provider event id in its own committed session. A processed
//!    id is a duplicate; a fresh `received` id is in flight elsewhere.
//! 4. Call the provider for anything the handler needs, then apply the
//!    change and mark the event `processed` in one session.
//! 5. On failure mark the event `failed` in a separate session so a
//!    redelivery can reclaim it, and publish `WebhookFailed`.
//!
//! Events about the same subscription are applied in arrival order; the
//! last one received wins.

use std::sync::Arc;

use chrono::{Duration, Utc};

use super::moderation::{ApprovalSource, approve_in_session};
use crate::domain::{
    DirectoryEvent, EventBus, Sponsorship, SponsorshipIntent, SponsorshipStatus,
    SponsorshipUpsert, SubmissionId, SubmissionStatus, WebhookClaim, WebhookEventStatus,
    WebhookStats,
};
use crate::error::AppError;
use crate::payments::{
    CheckoutIntent, CheckoutSessionObject, PaymentProvider, ProviderEvent, ProviderEventKind,
    SignatureError, SubscriptionSnapshot, verify_signature,
};
use crate::persistence::{RecordSession, RecordStore};

/// What happened to one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The event changed local state.
    Processed,
    /// The event was recorded but needs no action.
    Ignored,
    /// The event was already processed.
    Duplicate,
    /// Another delivery of the same event is being processed.
    InFlight,
    /// The event cannot be applied and was marked failed. Redelivery will
    /// not help, so it is still acknowledged.
    Failed {
        /// Captured error text.
        error: String,
    },
}

/// Result of applying one claimed event.
#[derive(Debug, Default)]
struct Applied {
    handled: bool,
    events: Vec<DirectoryEvent>,
}

impl Applied {
    fn handled(events: Vec<DirectoryEvent>) -> Self {
        Self {
            handled: true,
            events,
        }
    }

    fn ignored() -> Self {
        Self::default()
    }
}

fn activated(sponsorship: &Sponsorship) -> DirectoryEvent {
    DirectoryEvent::SponsorshipActivated {
        sponsorship_id: sponsorship.id,
        placement: sponsorship.placement,
        sponsor_name: sponsorship.sponsor_name.clone(),
        sponsor_email: sponsorship.sponsor_email.clone(),
        current_period_end: sponsorship.current_period_end,
        timestamp: Utc::now(),
    }
}

fn decode_intent(
    metadata: &std::collections::BTreeMap<String, String>,
) -> Result<Option<CheckoutIntent>, AppError> {
    CheckoutIntent::from_metadata(metadata).map_err(|e| AppError::InvalidRequest(e.to_string()))
}

/// Applies provider webhooks exactly once per provider event id.
#[derive(Debug, Clone)]
pub struct ReconciliationService {
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn PaymentProvider>,
    event_bus: EventBus,
    webhook_secret: Option<String>,
    tolerance_secs: i64,
    reclaim_after_secs: i64,
}

impl ReconciliationService {
    /// Creates a new `ReconciliationService`.
    ///
    /// Without a `webhook_secret` every delivery is refused.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn PaymentProvider>,
        event_bus: EventBus,
        webhook_secret: Option<String>,
        tolerance_secs: i64,
        reclaim_after_secs: i64,
    ) -> Self {
        Self {
            store,
            provider,
            event_bus,
            webhook_secret,
            tolerance_secs,
            reclaim_after_secs,
        }
    }

    /// Verifies, records and applies one webhook delivery.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotConfigured`] without a signing secret.
    /// - [`AppError::InvalidSignature`] for a missing, stale or wrong
    ///   signature. Nothing is recorded.
    /// - [`AppError::InvalidRequest`] for a body that is not an event.
    /// - [`AppError::PersistenceError`] or [`AppError::Payment`] when the
    ///   event could not be applied and should be redelivered.
    pub async fn reconcile(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<ReconcileOutcome, AppError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("webhook signing secret".to_string()))?;
        let header = signature.ok_or(SignatureError::MissingHeader)?;
        if let Err(e) =
            verify_signature(secret, payload, header, Utc::now().timestamp(), self.tolerance_secs)
        {
            tracing::warn!(error = %e, "webhook signature rejected");
            return Err(e.into());
        }

        let event =
            ProviderEvent::parse(payload).map_err(|e| AppError::InvalidRequest(e.to_string()))?;

        let reclaim_before = Utc::now() - Duration::seconds(self.reclaim_after_secs);
        let claim = {
            let mut session = self.store.begin().await?;
            let claim = session
                .claim_webhook_event(&event.id, &event.event_type, reclaim_before)
                .await?;
            session.commit().await?;
            claim
        };
        let attempt = match claim {
            WebhookClaim::Claimed { attempt } => attempt,
            WebhookClaim::AlreadyProcessed => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "duplicate webhook acknowledged"
                );
                return Ok(ReconcileOutcome::Duplicate);
            }
            WebhookClaim::InFlight => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "webhook already in flight, acknowledged"
                );
                return Ok(ReconcileOutcome::InFlight);
            }
        };

        match self.apply(&event).await {
            Ok(applied) => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    attempt,
                    handled = applied.handled,
                    "webhook processed"
                );
                for domain_event in applied.events {
                    self.event_bus.publish(domain_event);
                }
                Ok(if applied.handled {
                    ReconcileOutcome::Processed
                } else {
                    ReconcileOutcome::Ignored
                })
            }
            Err(err) => {
                self.record_failure(&event, &err).await;
                if err.is_transient() {
                    Err(err)
                } else {
                    Ok(ReconcileOutcome::Failed {
                        error: err.to_string(),
                    })
                }
            }
        }
    }

    /// Counts recorded events per status and lists recent failures.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on store failure.
    pub async fn stats(&self) -> Result<WebhookStats, AppError> {
        let mut session = self.store.begin().await?;
        session.webhook_stats().await
    }

    async fn record_failure(&self, event: &ProviderEvent, err: &AppError) {
        let error = err.to_string();
        tracing::error!(
            event_id = %event.id,
            event_type = %event.event_type,
            error = %error,
            "webhook processing failed"
        );
        let recorded = async {
            let mut session = self.store.begin().await?;
            session
                .finish_webhook_event(&event.id, WebhookEventStatus::Failed, Some(&error))
                .await?;
            session.commit().await
        }
        .await;
        if let Err(e) = recorded {
            // The row stays `received` and is reclaimed once stale.
            tracing::error!(event_id = %event.id, error = %e, "could not mark webhook failed");
        }
        self.event_bus.publish(DirectoryEvent::WebhookFailed {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            error,
            timestamp: Utc::now(),
        });
    }

    async fn apply(&self, event: &ProviderEvent) -> Result<Applied, AppError> {
        let intent = match &event.kind {
            ProviderEventKind::CheckoutCompleted(obj)
            | ProviderEventKind::CheckoutAsyncPaymentSucceeded(obj)
            | ProviderEventKind::CheckoutAsyncPaymentFailed(obj) => decode_intent(&obj.metadata)?,
            ProviderEventKind::PaymentIntentFailed(intent) => decode_intent(&intent.metadata)?,
            ProviderEventKind::SubscriptionUpdated(snapshot) => decode_intent(&snapshot.metadata)?,
            _ => None,
        };

        // Provider lookups happen before the session opens so no row lock
        // is held across a network call.
        let snapshot = match (&event.kind, &intent) {
            (
                ProviderEventKind::CheckoutCompleted(obj)
                | ProviderEventKind::CheckoutAsyncPaymentSucceeded(obj),
                Some(CheckoutIntent::Sponsorship(_)),
            ) => {
                let subscription = obj.subscription.as_deref().ok_or_else(|| {
                    AppError::InvalidRequest(format!(
                        "sponsorship checkout {} has no subscription",
                        obj.id
                    ))
                })?;
                Some(self.provider.retrieve_subscription(subscription).await?)
            }
            _ => None,
        };

        let mut session = self.store.begin().await?;
        let applied = match (&event.kind, intent, snapshot) {
            (
                ProviderEventKind::CheckoutCompleted(obj)
                | ProviderEventKind::CheckoutAsyncPaymentSucceeded(obj),
                Some(CheckoutIntent::Sponsorship(intent)),
                Some(snapshot),
            ) => activate_sponsorship(session.as_mut(), obj, intent, &snapshot).await?,
            (
                ProviderEventKind::CheckoutCompleted(obj)
                | ProviderEventKind::CheckoutAsyncPaymentSucceeded(obj),
                Some(CheckoutIntent::SubmissionPayment { submission_id, .. }),
                _,
            ) => pay_submission(session.as_mut(), obj, submission_id).await?,
            (
                ProviderEventKind::CheckoutAsyncPaymentFailed(obj),
                Some(CheckoutIntent::SubmissionPayment { submission_id, .. }),
                _,
            ) => {
                let reference = obj.payment_intent.as_deref().unwrap_or(&obj.id);
                fail_submission(session.as_mut(), submission_id, reference, None).await?
            }
            (
                ProviderEventKind::PaymentIntentFailed(payment),
                Some(CheckoutIntent::SubmissionPayment { submission_id, .. }),
                _,
            ) => {
                fail_submission(
                    session.as_mut(),
                    submission_id,
                    &payment.id,
                    payment.failure_message.clone(),
                )
                .await?
            }
            (ProviderEventKind::SubscriptionUpdated(snapshot), intent, _) => {
                let intent = match intent {
                    Some(CheckoutIntent::Sponsorship(intent)) => Some(intent),
                    _ => None,
                };
                refresh_subscription(session.as_mut(), snapshot, intent).await?
            }
            (ProviderEventKind::SubscriptionDeleted(snapshot), _, _) => {
                set_subscription_status(
                    session.as_mut(),
                    &snapshot.id,
                    SponsorshipStatus::Canceled,
                    snapshot,
                )
                .await?
            }
            (ProviderEventKind::InvoicePaymentFailed(invoice), _, _) => {
                match invoice.subscription.as_deref() {
                    Some(reference) => {
                        let updated = session
                            .update_sponsorship_status(reference, SponsorshipStatus::PastDue, None)
                            .await?;
                        log_status_change(reference, SponsorshipStatus::PastDue, updated.as_ref());
                        Applied::handled(Vec::new())
                    }
                    None => Applied::ignored(),
                }
            }
            _ => Applied::ignored(),
        };
        session
            .finish_webhook_event(&event.id, WebhookEventStatus::Processed, None)
            .await?;
        session.commit().await?;
        Ok(applied)
    }
}

async fn activate_sponsorship(
    session: &mut dyn RecordSession,
    checkout: &CheckoutSessionObject,
    mut intent: SponsorshipIntent,
    snapshot: &SubscriptionSnapshot,
) -> Result<Applied, AppError> {
    if intent.sponsor_email.is_none() {
        intent.sponsor_email.clone_from(&checkout.customer_email);
    }
    let upsert = SponsorshipUpsert {
        intent,
        status: SponsorshipStatus::Active,
        current_period_end: snapshot.current_period_end,
        provider_subscription_id: snapshot.id.clone(),
        provider_session_id: Some(checkout.id.clone()),
    };
    let (sponsorship, created) = session.upsert_sponsorship(&upsert).await?;
    tracing::info!(
        sponsorship_id = %sponsorship.id,
        subscription_ref = %sponsorship.provider_subscription_id,
        placement = %sponsorship.placement,
        created,
        "sponsorship activated"
    );
    let events = if created {
        vec![activated(&sponsorship)]
    } else {
        Vec::new()
    };
    Ok(Applied::handled(events))
}

async fn pay_submission(
    session: &mut dyn RecordSession,
    checkout: &CheckoutSessionObject,
    submission_id: SubmissionId,
) -> Result<Applied, AppError> {
    if !checkout.is_paid() {
        tracing::info!(
            submission_id = %submission_id,
            session_id = %checkout.id,
            "submission checkout completed unpaid, awaiting async payment"
        );
        return Ok(Applied::ignored());
    }
    let payment_id = checkout.payment_intent.as_deref().unwrap_or(&checkout.id);
    let approval =
        approve_in_session(session, submission_id, ApprovalSource::Payment { payment_id }).await?;
    Ok(Applied::handled(approval.event().into_iter().collect()))
}

async fn fail_submission(
    session: &mut dyn RecordSession,
    submission_id: SubmissionId,
    payment_ref: &str,
    reason: Option<String>,
) -> Result<Applied, AppError> {
    let submission = session
        .submission_for_update(submission_id)
        .await?
        .ok_or(AppError::SubmissionNotFound(*submission_id.as_uuid()))?;
    if submission.status != SubmissionStatus::Pending {
        tracing::info!(
            submission_id = %submission_id,
            status = %submission.status,
            "payment failure ignored for non-pending submission"
        );
        return Ok(Applied::handled(Vec::new()));
    }
    session
        .set_submission_status(submission_id, SubmissionStatus::Failed, Some(payment_ref))
        .await?;
    tracing::info!(
        submission_id = %submission_id,
        payment_id = payment_ref,
        "submission payment failed"
    );
    Ok(Applied::handled(vec![DirectoryEvent::SubmissionPaymentFailed {
        submission_id,
        tool_name: submission.tool_name,
        email: submission.email,
        reason,
        timestamp: Utc::now(),
    }]))
}

async fn refresh_subscription(
    session: &mut dyn RecordSession,
    snapshot: &SubscriptionSnapshot,
    intent: Option<SponsorshipIntent>,
) -> Result<Applied, AppError> {
    let status = SponsorshipStatus::from_provider(&snapshot.status);
    let Some(intent) = intent else {
        return set_subscription_status(session, &snapshot.id, status, snapshot).await;
    };
    let upsert = SponsorshipUpsert {
        intent,
        status,
        current_period_end: snapshot.current_period_end,
        provider_subscription_id: snapshot.id.clone(),
        provider_session_id: None,
    };
    let (sponsorship, created) = session.upsert_sponsorship(&upsert).await?;
    log_status_change(&snapshot.id, status, Some(&sponsorship));
    let events = if created && status == SponsorshipStatus::Active {
        vec![activated(&sponsorship)]
    } else {
        Vec::new()
    };
    Ok(Applied::handled(events))
}

async fn set_subscription_status(
    session: &mut dyn RecordSession,
    reference: &str,
    status: SponsorshipStatus,
    snapshot: &SubscriptionSnapshot,
) -> Result<Applied, AppError> {
    let updated = session
        .update_sponsorship_status(reference, status, snapshot.current_period_end)
        .await?;
    log_status_change(reference, status, updated.as_ref());
    Ok(if updated.is_some() {
        Applied::handled(Vec::new())
    } else {
        Applied::ignored()
    })
}

fn log_status_change(reference: &str, status: SponsorshipStatus, row: Option<&Sponsorship>) {
    match row {
        Some(sponsorship) => tracing::info!(
            sponsorship_id = %sponsorship.id,
            subscription_ref = reference,
            status = %status,
            "sponsorship status updated"
        ),
        None => tracing::debug!(
            subscription_ref = reference,
            status = %status,
            "no sponsorship for subscription, skipped"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{NewSubmission, Tier, WebhookEvent};
    use crate::payments::signature_header;
    use crate::persistence::MemoryStore;
    use crate::service::fakes::FakeProvider;

    const SECRET: &str = "whsec_test";

    struct Harness {
        store: MemoryStore,
        provider: Arc<FakeProvider>,
        bus: EventBus,
        service: ReconciliationService,
    }

    fn harness() -> Harness {
        let store = MemoryStore::new();
        let provider = Arc::new(FakeProvider::default());
        let bus = EventBus::new(16);
        let service = ReconciliationService::new(
            Arc::new(store.clone()),
            Arc::clone(&provider) as Arc<dyn PaymentProvider>,
            bus.clone(),
            Some(SECRET.to_string()),
            300,
            600,
        );
        Harness {
            store,
            provider,
            bus,
            service,
        }
    }

    fn signed(body: &serde_json::Value) -> (Vec<u8>, String) {
        let payload = body.to_string().into_bytes();
        let Ok(header) = signature_header(SECRET, &payload, Utc::now().timestamp()) else {
            panic!("signing failed");
        };
        (payload, header)
    }

    async fn deliver(h: &Harness, body: &serde_json::Value) -> Result<ReconcileOutcome, AppError> {
        let (payload, header) = signed(body);
        h.service.reconcile(&payload, Some(&header)).await
    }

    fn newsletter_checkout(event_id: &str) -> serde_json::Value {
        json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_news",
                "subscription": "sub_news",
                "payment_status": "paid",
                "customer_details": { "email": "ads@acme.dev" },
                "metadata": {
                    "type": "sponsorship",
                    "placement": "newsletter",
                    "sponsorName": "Acme"
                }
            }}
        })
    }

    async fn seed_paid_submission(store: &MemoryStore) -> SubmissionId {
        let Ok(mut session) = store.begin().await else {
            panic!("begin failed");
        };
        let new = NewSubmission {
            id: SubmissionId::new(),
            tool_name: "Paid Tool".to_string(),
            description: "A tool that paid for a premium listing.".to_string(),
            website_url: "https://paid.dev/".to_string(),
            category: "coding".to_string(),
            pricing: "paid".to_string(),
            email: "maker@example.com".to_string(),
            tier: Tier::Premium,
            amount_cents: 9_900,
        };
        assert!(session.insert_submission(&new).await.is_ok());
        assert!(session.commit().await.is_ok());
        new.id
    }

    async fn submission_status(store: &MemoryStore, id: SubmissionId) -> SubmissionStatus {
        let Ok(mut session) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(Some(submission)) = session.submission_for_update(id).await else {
            panic!("submission missing");
        };
        submission.status
    }

    fn only_event(events: &[WebhookEvent]) -> &WebhookEvent {
        let [event] = events else {
            panic!("expected exactly one webhook row, got {}", events.len());
        };
        event
    }

    #[tokio::test]
    async fn newsletter_checkout_replay_creates_one_sponsorship() {
        let h = harness();
        let mut rx = h.bus.subscribe();
        let body = newsletter_checkout("evt_news");

        let first = deliver(&h, &body).await;
        let second = deliver(&h, &body).await;
        assert!(matches!(first, Ok(ReconcileOutcome::Processed)));
        assert!(matches!(second, Ok(ReconcileOutcome::Duplicate)));

        let sponsorships = h.store.sponsorships().await;
        let [sponsorship] = sponsorships.as_slice() else {
            panic!("expected one sponsorship");
        };
        assert_eq!(sponsorship.status, SponsorshipStatus::Active);
        assert_eq!(sponsorship.provider_subscription_id, "sub_news");
        assert_eq!(sponsorship.sponsor_email.as_deref(), Some("ads@acme.dev"));
        assert!(sponsorship.current_period_end.is_some());
        assert_eq!(h.provider.retrievals(), 1);

        let events = h.store.webhook_events().await;
        assert_eq!(only_event(&events).status, WebhookEventStatus::Processed);

        let Ok(DirectoryEvent::SponsorshipActivated { sponsor_name, .. }) = rx.try_recv() else {
            panic!("expected activation event");
        };
        assert_eq!(sponsor_name.as_deref(), Some("Acme"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_delivery_of_one_event_applies_once() {
        let h = harness();
        let (payload, header) = signed(&newsletter_checkout("evt_race"));

        let (a, b) = tokio::join!(
            h.service.reconcile(&payload, Some(&header)),
            h.service.reconcile(&payload, Some(&header))
        );
        let (Ok(a), Ok(b)) = (a, b) else {
            panic!("both deliveries should be acknowledged");
        };
        let outcomes = [a, b];
        let processed = outcomes
            .iter()
            .filter(|o| **o == ReconcileOutcome::Processed)
            .count();
        assert_eq!(processed, 1, "outcomes {outcomes:?}");
        assert!(outcomes.iter().any(|o| matches!(
            o,
            ReconcileOutcome::Duplicate | ReconcileOutcome::InFlight
        )));

        assert_eq!(h.store.sponsorships().await.len(), 1);
        let events = h.store.webhook_events().await;
        assert_eq!(only_event(&events).status, WebhookEventStatus::Processed);
    }

    #[tokio::test]
    async fn payment_racing_admin_approval_lists_one_tool() {
        let h = harness();
        let id = seed_paid_submission(&h.store).await;
        let moderation = crate::service::ModerationService::new(
            Arc::new(h.store.clone()),
            h.bus.clone(),
        );
        let body = json!({
            "id": "evt_paid_race",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_paid_race",
                "payment_intent": "pi_paid_race",
                "payment_status": "paid",
                "metadata": { "type": "submission", "submissionId": id.to_string(), "tier": "premium" }
            }}
        });

        let (webhook, admin) = tokio::join!(deliver(&h, &body), moderation.approve(id));
        assert!(matches!(webhook, Ok(ReconcileOutcome::Processed)));
        assert!(admin.is_ok());
        assert_eq!(submission_status(&h.store, id).await, SubmissionStatus::Approved);
        assert_eq!(h.store.tools().await.len(), 1);
    }

    #[tokio::test]
    async fn bad_signature_records_nothing() {
        let h = harness();
        let (payload, _) = signed(&newsletter_checkout("evt_bad"));
        let Ok(forged) = signature_header("whsec_other", &payload, Utc::now().timestamp()) else {
            panic!("signing failed");
        };
        let result = h.service.reconcile(&payload, Some(&forged)).await;
        assert!(matches!(
            result,
            Err(AppError::InvalidSignature(SignatureError::Mismatch))
        ));
        let missing = h.service.reconcile(&payload, None).await;
        assert!(matches!(
            missing,
            Err(AppError::InvalidSignature(SignatureError::MissingHeader))
        ));
        assert!(h.store.webhook_events().await.is_empty());
        assert!(h.store.sponsorships().await.is_empty());
    }

    #[tokio::test]
    async fn missing_secret_is_not_configured() {
        let store = MemoryStore::new();
        let service = ReconciliationService::new(
            Arc::new(store),
            Arc::new(FakeProvider::default()),
            EventBus::new(4),
            None,
            300,
            600,
        );
        let result = service.reconcile(b"{}", Some("t=1,v1=00")).await;
        assert!(matches!(result, Err(AppError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn paid_submission_is_approved() {
        let h = harness();
        let mut rx = h.bus.subscribe();
        let id = seed_paid_submission(&h.store).await;
        let body = json!({
            "id": "evt_paid",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_paid",
                "payment_intent": "pi_paid",
                "payment_status": "paid",
                "metadata": { "type": "submission", "submissionId": id.to_string(), "tier": "premium" }
            }}
        });
        assert!(matches!(deliver(&h, &body).await, Ok(ReconcileOutcome::Processed)));
        assert_eq!(submission_status(&h.store, id).await, SubmissionStatus::Approved);

        let tools = h.store.tools().await;
        let [tool] = tools.as_slice() else {
            panic!("expected one tool");
        };
        assert!(tool.is_featured);
        assert!(matches!(
            rx.try_recv(),
            Ok(DirectoryEvent::SubmissionApproved { .. })
        ));
    }

    #[tokio::test]
    async fn unpaid_completion_waits_for_async_payment() {
        let h = harness();
        let id = seed_paid_submission(&h.store).await;
        let metadata = json!({ "type": "submission", "submissionId": id.to_string(), "tier": "premium" });
        let completed = json!({
            "id": "evt_unpaid",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_async", "payment_status": "unpaid", "metadata": metadata } }
        });
        assert!(matches!(deliver(&h, &completed).await, Ok(ReconcileOutcome::Ignored)));
        assert_eq!(submission_status(&h.store, id).await, SubmissionStatus::Pending);

        let succeeded = json!({
            "id": "evt_async_ok",
            "type": "checkout.session.async_payment_succeeded",
            "data": { "object": {
                "id": "cs_async",
                "payment_intent": "pi_async",
                "payment_status": "paid",
                "metadata": metadata
            }}
        });
        assert!(matches!(deliver(&h, &succeeded).await, Ok(ReconcileOutcome::Processed)));
        assert_eq!(submission_status(&h.store, id).await, SubmissionStatus::Approved);
    }

    #[tokio::test]
    async fn payment_failure_marks_submission_failed_once() {
        let h = harness();
        let mut rx = h.bus.subscribe();
        let id = seed_paid_submission(&h.store).await;
        let body = |event_id: &str| {
            json!({
                "id": event_id,
                "type": "payment_intent.payment_failed",
                "data": { "object": {
                    "id": "pi_declined",
                    "last_payment_error": { "message": "card declined" },
                    "metadata": { "type": "submission", "submissionId": id.to_string(), "tier": "premium" }
                }}
            })
        };
        assert!(matches!(deliver(&h, &body("evt_f1")).await, Ok(ReconcileOutcome::Processed)));
        assert!(matches!(deliver(&h, &body("evt_f2")).await, Ok(ReconcileOutcome::Processed)));
        assert_eq!(submission_status(&h.store, id).await, SubmissionStatus::Failed);

        let Ok(DirectoryEvent::SubmissionPaymentFailed { reason, .. }) = rx.try_recv() else {
            panic!("expected payment failure event");
        };
        assert_eq!(reason.as_deref(), Some("card declined"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscription_lifecycle_updates_status() {
        let h = harness();
        assert!(deliver(&h, &newsletter_checkout("evt_start")).await.is_ok());

        let invoice = json!({
            "id": "evt_invoice",
            "type": "invoice.payment_failed",
            "data": { "object": {
                "id": "in_1",
                "parent": { "subscription_details": { "subscription": "sub_news" } }
            }}
        });
        assert!(matches!(deliver(&h, &invoice).await, Ok(ReconcileOutcome::Processed)));
        let statuses: Vec<_> = h.store.sponsorships().await.iter().map(|s| s.status).collect();
        assert_eq!(statuses, [SponsorshipStatus::PastDue]);

        let deleted = json!({
            "id": "evt_deleted",
            "type": "customer.subscription.deleted",
            "data": { "object": { "id": "sub_news", "status": "canceled" } }
        });
        assert!(matches!(deliver(&h, &deleted).await, Ok(ReconcileOutcome::Processed)));
        let statuses: Vec<_> = h.store.sponsorships().await.iter().map(|s| s.status).collect();
        assert_eq!(statuses, [SponsorshipStatus::Canceled]);
    }

    #[tokio::test]
    async fn subscription_update_with_metadata_creates_row() {
        let h = harness();
        let body = json!({
            "id": "evt_update_first",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_early",
                "status": "active",
                "current_period_end": 4_102_444_800_i64,
                "metadata": { "type": "sponsorship", "placement": "newsletter" }
            }}
        });
        assert!(matches!(deliver(&h, &body).await, Ok(ReconcileOutcome::Processed)));
        let sponsorships = h.store.sponsorships().await;
        let [sponsorship] = sponsorships.as_slice() else {
            panic!("expected one sponsorship");
        };
        assert_eq!(sponsorship.status, SponsorshipStatus::Active);
        assert_eq!(
            sponsorship.current_period_end.map(|end| end.timestamp()),
            Some(4_102_444_800)
        );
    }

    #[tokio::test]
    async fn provider_outage_fails_then_redelivery_succeeds() {
        let h = harness();
        let mut rx = h.bus.subscribe();
        let body = newsletter_checkout("evt_outage");

        h.provider.set_failing(true);
        let first = deliver(&h, &body).await;
        assert!(matches!(first, Err(AppError::Payment(_))));
        let events = h.store.webhook_events().await;
        assert_eq!(only_event(&events).status, WebhookEventStatus::Failed);
        assert!(matches!(rx.try_recv(), Ok(DirectoryEvent::WebhookFailed { .. })));

        h.provider.set_failing(false);
        assert!(matches!(deliver(&h, &body).await, Ok(ReconcileOutcome::Processed)));
        let events = h.store.webhook_events().await;
        let row = only_event(&events);
        assert_eq!(row.status, WebhookEventStatus::Processed);
        assert_eq!(row.attempts, 2);
        assert_eq!(h.store.sponsorships().await.len(), 1);
    }

    #[tokio::test]
    async fn business_failure_is_acknowledged_and_recorded() {
        let h = harness();
        let body = json!({
            "id": "evt_ghost",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_ghost",
                "payment_status": "paid",
                "metadata": {
                    "type": "submission",
                    "submissionId": SubmissionId::new().to_string(),
                    "tier": "priority"
                }
            }}
        });
        let Ok(ReconcileOutcome::Failed { error }) = deliver(&h, &body).await else {
            panic!("expected acknowledged failure");
        };
        assert!(error.contains("not found"));
        let events = h.store.webhook_events().await;
        let row = only_event(&events);
        assert_eq!(row.status, WebhookEventStatus::Failed);
        assert!(row.error.is_some());
    }

    #[tokio::test]
    async fn unknown_event_type_is_ignored_but_recorded() {
        let h = harness();
        let body = json!({
            "id": "evt_other",
            "type": "customer.created",
            "data": { "object": { "id": "cus_1" } }
        });
        assert!(matches!(deliver(&h, &body).await, Ok(ReconcileOutcome::Ignored)));
        let events = h.store.webhook_events().await;
        assert_eq!(only_event(&events).status, WebhookEventStatus::Processed);
    }

    #[tokio::test]
    async fn fresh_received_row_is_in_flight() {
        let h = harness();
        {
            let Ok(mut session) = h.store.begin().await else {
                panic!("begin failed");
            };
            let claim = session
                .claim_webhook_event("evt_busy", "checkout.session.completed", Utc::now())
                .await;
            assert!(claim.is_ok());
            assert!(session.commit().await.is_ok());
        }
        let outcome = deliver(&h, &newsletter_checkout("evt_busy")).await;
        assert!(matches!(outcome, Ok(ReconcileOutcome::InFlight)));
        assert!(h.store.sponsorships().await.is_empty());
    }
}
