//! vibestack-core server entry point.
//!
//! Starts the Axum HTTP server and the notification dispatcher.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use vibestack_core::api;
use vibestack_core::app_state::AppState;
use vibestack_core::config::AppConfig;
use vibestack_core::domain::EventBus;
use vibestack_core::notify::{self, NotificationDispatcher};
use vibestack_core::payments::{PaymentProvider, StripeClient};
use vibestack_core::persistence::{MemoryStore, PostgresStore, RecordStore};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    if !config.persistence_enabled {
        tracing::warn!("PERSISTENCE_ENABLED=false, using the in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PostgresStore::connect(config)
        .await
        .context("connecting to PostgreSQL")?;
    if config.run_migrations {
        store.migrate().await.context("running migrations")?;
        tracing::info!("database migrations applied");
    }
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env().context("loading configuration")?;
    init_tracing(config.log_json);
    tracing::info!(addr = %config.listen_addr, "starting vibestack-core");

    if config.stripe.secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set, checkout will fail");
    }
    if config.stripe.webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhooks will be refused");
    }

    // Build infrastructure
    let store = open_store(&config).await?;
    let provider: Arc<dyn PaymentProvider> =
        Arc::new(StripeClient::new(&config.stripe).context("building Stripe client")?);
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Notifications run beside the request path
    let (mailer, alerter) =
        notify::from_settings(&config.notifications).context("building notifiers")?;
    let dispatcher = NotificationDispatcher::new(mailer, alerter, config.public_base_url.clone());
    let _dispatcher = dispatcher.spawn(event_bus.subscribe());

    // Build application
    let listen_addr = config.listen_addr;
    let app_state = AppState::new(config, store, provider, event_bus);
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
