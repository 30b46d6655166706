mod api;
mod bootstrap;
mod health;
mod notify;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use corrubox_core::audit::TracingAuditSink;
use corrubox_core::config::{AppConfig, LoadOptions};
use corrubox_core::notification::NotificationSink;

fn init_logging(config: &AppConfig) {
    use corrubox_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let notifications: Arc<dyn NotificationSink> =
        match notify::WebhookNotificationSink::from_config(&app.config.notification)? {
            Some(sink) => Arc::new(sink),
            None => Arc::new(notify::DisabledNotificationSink),
        };

    let state = api::ApiState {
        pricing_configs: Arc::new(corrubox_db::repositories::SqlPricingConfigRepository::new(
            app.db_pool.clone(),
        )),
        clients: Arc::new(corrubox_db::repositories::SqlClientRepository::new(
            app.db_pool.clone(),
        )),
        public_quotes: Arc::new(corrubox_db::repositories::SqlPublicQuoteRepository::new(
            app.db_pool.clone(),
        )),
        quotes: Arc::new(corrubox_db::repositories::SqlQuoteRepository::new(
            app.db_pool.clone(),
        )),
        orders: Arc::new(corrubox_db::repositories::SqlOrderRepository::new(
            app.db_pool.clone(),
        )),
        audit: Arc::new(TracingAuditSink),
        notifications,
        quoting: app.config.quoting.clone(),
        notification_enabled: app.config.notification.enabled,
    };

    let router = api::router(state).merge(health::router(app.db_pool.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "corrubox-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let serve = axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown());
    tokio::select! {
        result = serve => result?,
        // Drain cap: open connections get at most the configured grace
        // period after the shutdown signal.
        _ = shutdown_deadline(grace) => {
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "grace period elapsed, aborting open connections"
            );
        }
    }

    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "corrubox-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "failed to install shutdown handler");
        return;
    }
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "shutdown signal received, draining connections"
    );
}

async fn shutdown_deadline(grace: Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler, never force the deadline.
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}
