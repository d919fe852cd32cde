//! Ratekeeper Binary
//!
//! Serves exchange rates fetched from OpenExchangeRates.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ratekeeper_fx::{AuditSink, TracingAuditSink};
use ratekeeper_service::{
    router, OpenExchangeRatesSource, PostgresAuditSink, RateService, ServiceConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Ratekeeper");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let source = Arc::new(OpenExchangeRatesSource::new(&config.provider)?);

    let audit: Arc<dyn AuditSink> = match &config.database_url {
        Some(url) => {
            let sink = PostgresAuditSink::connect(url).await?;
            sink.ensure_schema().await?;
            Arc::new(sink)
        }
        None => {
            warn!("DATABASE_URL not set, quotes will only be logged");
            Arc::new(TracingAuditSink)
        }
    };

    let service = Arc::new(RateService::new(config.clone(), source, audit));
    service.start().await?;

    let listener =
        tokio::net::TcpListener::bind((config.listen_addr.as_str(), config.listen_port)).await?;

    info!(
        listen_addr = %config.listen_addr,
        listen_port = config.listen_port,
        "Ratekeeper running"
    );

    axum::serve(listener, router(service.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.stop().await?;

    info!("Ratekeeper shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
