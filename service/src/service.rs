//! The rate service: cache, refresh scheduler and lifecycle.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use ratekeeper_common::{age_seconds, CrossRateTable, Currency};
use ratekeeper_fx::{AuditSink, FxError, QuoteSource, RateCache, RateCacheStats, SharedRateCache};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::metrics::{Metrics, SharedMetrics};
use crate::scheduler::RefreshScheduler;
use crate::state::ServiceState;

const SCHEDULER_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Health report served on `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub state: ServiceState,
    pub cache: RateCacheStats,
    /// Seconds since the published quote's timestamp.
    pub quote_age_secs: Option<i64>,
}

/// Owns the rate cache and keeps it refreshed.
pub struct RateService {
    config: ServiceConfig,
    cache: SharedRateCache,
    metrics: SharedMetrics,
    state: Arc<RwLock<ServiceState>>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: Mutex<Option<mpsc::Receiver<()>>>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl RateService {
    /// Create a new service instance.
    pub fn new(
        config: ServiceConfig,
        source: Arc<dyn QuoteSource>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let cache = Arc::new(RateCache::new(source, audit, config.cache.clone()));

        Self {
            config,
            cache,
            metrics: Arc::new(Metrics::new()),
            state: Arc::new(RwLock::new(ServiceState::Starting)),
            shutdown_tx,
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
            scheduler: Mutex::new(None),
        }
    }

    /// Start the refresh scheduler.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let shutdown_rx = {
            let state = self.state.read();
            if *state != ServiceState::Starting {
                return Err(ServiceError::InvalidState(format!(
                    "cannot start from {:?}",
                    *state
                )));
            }
            self.shutdown_rx
                .lock()
                .take()
                .ok_or_else(|| ServiceError::InvalidState("already started".to_string()))?
        };

        let scheduler = RefreshScheduler::new(
            self.cache.clone(),
            self.config.refresh.clone(),
            self.metrics.clone(),
        );
        *self.scheduler.lock() = Some(tokio::spawn(scheduler.run(shutdown_rx)));

        *self.state.write() = ServiceState::Running;

        info!(
            provider_base = %self.config.provider.base_currency,
            scale = self.config.cache.scale,
            "Rate service started"
        );
        Ok(())
    }

    /// Stop the scheduler and fail pending registrations.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        if self.state().is_terminal() {
            return Ok(());
        }

        info!("Stopping rate service");
        *self.state.write() = ServiceState::ShuttingDown;

        let _ = self.shutdown_tx.send(()).await;
        self.cache.interrupt_waiters();

        let handle = self.scheduler.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(SCHEDULER_STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Refresh scheduler task failed"),
                Err(_) => warn!(
                    timeout_secs = SCHEDULER_STOP_TIMEOUT.as_secs(),
                    "Refresh scheduler did not stop in time"
                ),
            }
        }

        *self.state.write() = ServiceState::Stopped;
        info!("Rate service stopped");
        Ok(())
    }

    /// Register a currency, recording the outcome.
    pub async fn register_currency(&self, code: &Currency) -> Result<BTreeSet<Currency>> {
        if let Err(e) = self.ensure_accepting() {
            self.metrics.registration_rejected(false);
            return Err(e);
        }

        let result = self.cache.register_currency(code).await;
        match &result {
            Ok(_) => self.metrics.registration_accepted(),
            Err(e) => self
                .metrics
                .registration_rejected(matches!(e, FxError::LockTimeout { .. })),
        }
        Ok(result?)
    }

    /// Cross-rate table for `base`, recording the lookup.
    pub fn get_rates(&self, base: &Currency) -> Result<Arc<CrossRateTable>> {
        if let Err(e) = self.ensure_accepting() {
            self.metrics.rate_lookup(false);
            return Err(e);
        }

        let result = self.cache.get_rates(base);
        self.metrics.rate_lookup(result.is_ok());
        Ok(result?)
    }

    /// Currently tracked currencies.
    pub fn list_currencies(&self) -> BTreeSet<Currency> {
        self.cache.list_currencies()
    }

    /// Current health report.
    pub fn health(&self) -> HealthReport {
        let cache = self.cache.stats();
        HealthReport {
            state: self.state(),
            quote_age_secs: cache.quote_timestamp.map(age_seconds),
            cache,
        }
    }

    /// Prometheus exposition of service and cache metrics.
    pub fn prometheus(&self) -> String {
        self.metrics.to_prometheus(&self.cache.stats())
    }

    pub fn cache(&self) -> &SharedRateCache {
        &self.cache
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Get the current service state.
    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    /// Check if the service is accepting requests.
    pub fn is_accepting_requests(&self) -> bool {
        self.state().accepts_requests()
    }

    fn ensure_accepting(&self) -> Result<()> {
        let state = self.state();
        if state.accepts_requests() {
            Ok(())
        } else {
            Err(ServiceError::NotAccepting(state))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratekeeper_common::Quote;
    use ratekeeper_fx::{MockAuditSink, MockQuoteSource};
    use rust_decimal_macros::dec;

    fn quote() -> Quote {
        Quote::new(
            12345,
            Currency::usd(),
            vec![
                (Currency::usd(), dec!(1)),
                (Currency::eur(), dec!(0.925926)),
                (Currency::uah(), dec!(41.15)),
            ],
        )
        .unwrap()
    }

    fn service() -> RateService {
        let mut config = ServiceConfig::default();
        config.provider.app_id = "test".to_string();
        RateService::new(
            config,
            Arc::new(MockQuoteSource::with_quote(quote())),
            Arc::new(MockAuditSink::new()),
        )
    }

    async fn wait_initialized(service: &RateService) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !service.cache().is_initialized() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("initial refresh should complete");
    }

    #[tokio::test]
    async fn test_service_creation() {
        let service = service();
        assert_eq!(service.state(), ServiceState::Starting);
        assert!(!service.is_accepting_requests());
        assert!(service.list_currencies().is_empty());
    }

    #[tokio::test]
    async fn test_service_start_stop() {
        let service = service();

        service.start().await.unwrap();
        assert_eq!(service.state(), ServiceState::Running);
        wait_initialized(&service).await;

        service.stop().await.unwrap();
        assert_eq!(service.state(), ServiceState::Stopped);

        // stopping twice is harmless
        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let service = service();
        service.start().await.unwrap();

        assert!(matches!(
            service.start().await,
            Err(ServiceError::InvalidState(_))
        ));

        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_requests_rejected_outside_running() {
        let service = service();
        service.cache().refresh().await.unwrap();

        assert!(matches!(
            service.register_currency(&Currency::eur()).await,
            Err(ServiceError::NotAccepting(ServiceState::Starting))
        ));
        assert!(matches!(
            service.get_rates(&Currency::eur()),
            Err(ServiceError::NotAccepting(ServiceState::Starting))
        ));
        assert!(service.list_currencies().is_empty());

        service.start().await.unwrap();
        service.register_currency(&Currency::eur()).await.unwrap();
        service.stop().await.unwrap();

        assert!(matches!(
            service.get_rates(&Currency::eur()),
            Err(ServiceError::NotAccepting(ServiceState::Stopped))
        ));
        assert!(matches!(
            service.register_currency(&Currency::usd()).await,
            Err(ServiceError::NotAccepting(ServiceState::Stopped))
        ));

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.registrations, 1);
        assert_eq!(snapshot.registrations_rejected, 2);
        assert_eq!(snapshot.rate_lookups_failed, 2);
    }

    #[tokio::test]
    async fn test_register_and_read_records_metrics() {
        let service = service();
        service.start().await.unwrap();
        wait_initialized(&service).await;

        let tracked = service.register_currency(&Currency::eur()).await.unwrap();
        assert!(tracked.contains(&Currency::eur()));

        let table = service.get_rates(&Currency::eur()).unwrap();
        assert_eq!(table.rate(&Currency::usd()), Some(dec!(1.08)));

        assert!(service.get_rates(&Currency::uah()).is_err());
        assert!(service
            .register_currency(&Currency::new("XYZ"))
            .await
            .is_err());

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.registrations, 1);
        assert_eq!(snapshot.registrations_rejected, 1);
        assert_eq!(snapshot.rate_lookups, 1);
        assert_eq!(snapshot.rate_lookups_failed, 1);

        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_health_report() {
        let service = service();
        let health = service.health();
        assert!(!health.cache.initialized);
        assert!(health.quote_age_secs.is_none());

        service.start().await.unwrap();
        wait_initialized(&service).await;

        let health = service.health();
        assert_eq!(health.state, ServiceState::Running);
        assert_eq!(health.cache.quote_timestamp, Some(12345));
        assert!(health.quote_age_secs.unwrap() > 0);

        service.stop().await.unwrap();
    }
}
