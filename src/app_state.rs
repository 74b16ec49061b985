//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::domain::EventBus;
use crate::payments::PaymentProvider;
use crate::persistence::RecordStore;
use crate::service::{
    CatalogService, CheckoutService, IntakeService, ModerationService, ReconciliationService,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration the process was started with.
    pub config: Arc<AppConfig>,
    /// Public submission intake.
    pub intake: Arc<IntakeService>,
    /// Admin moderation.
    pub moderation: Arc<ModerationService>,
    /// Provider checkout sessions.
    pub checkout: Arc<CheckoutService>,
    /// Webhook reconciliation.
    pub reconciliation: Arc<ReconciliationService>,
    /// Read-only catalog queries.
    pub catalog: Arc<CatalogService>,
    /// Event bus the notification dispatcher subscribes to.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires every service against one store, provider and event bus.
    #[must_use]
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn PaymentProvider>,
        event_bus: EventBus,
    ) -> Self {
        let intake = IntakeService::new(Arc::clone(&store), config.max_submission_bytes);
        let moderation = ModerationService::new(Arc::clone(&store), event_bus.clone());
        let checkout = CheckoutService::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            config.prices.clone(),
            config.public_base_url.clone(),
        );
        let reconciliation = ReconciliationService::new(
            Arc::clone(&store),
            provider,
            event_bus.clone(),
            config.stripe.webhook_secret.clone(),
            config.stripe.webhook_tolerance_secs,
            config.webhook_reclaim_after_secs,
        );
        let catalog = CatalogService::new(store);
        Self {
            config: Arc::new(config),
            intake: Arc::new(intake),
            moderation: Arc::new(moderation),
            checkout: Arc::new(checkout),
            reconciliation: Arc::new(reconciliation),
            catalog: Arc::new(catalog),
            event_bus,
        }
    }
}
