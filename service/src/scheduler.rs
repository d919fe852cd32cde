//! Periodic refresh of the rate cache.

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use ratekeeper_fx::{FxResult, SharedRateCache};

use crate::config::RefreshConfig;
use crate::metrics::SharedMetrics;

/// Drives [`RateCache::refresh`](ratekeeper_fx::RateCache::refresh) on a fixed
/// interval, retrying failed attempts with linear backoff.
pub struct RefreshScheduler {
    cache: SharedRateCache,
    config: RefreshConfig,
    metrics: SharedMetrics,
}

impl RefreshScheduler {
    pub fn new(cache: SharedRateCache, config: RefreshConfig, metrics: SharedMetrics) -> Self {
        Self {
            cache,
            config,
            metrics,
        }
    }

    /// Run until `shutdown` fires or its sender is dropped.
    ///
    /// The first refresh happens immediately.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.interval.as_secs(),
            max_attempts = self.config.max_attempts,
            "Refresh scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }

            tokio::select! {
                _ = self.refresh_with_retry() => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Refresh scheduler stopped");
    }

    /// Refresh once, retrying up to `max_attempts` times.
    #[instrument(skip(self), fields(refresh_id = %Uuid::now_v7()))]
    pub async fn refresh_with_retry(&self) -> FxResult<()> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.metrics.refresh_attempted();

            match self.cache.refresh().await {
                Ok(_) => {
                    self.metrics.refresh_succeeded();
                    return Ok(());
                }
                Err(e) if attempt < self.config.max_attempts && e.is_retryable() => {
                    let delay = self.config.retry_backoff * attempt;
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Refresh failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.metrics.refresh_failed();
                    error!(attempt, error = %e, "Refresh failed, keeping previous rates");
                    return Err(e);
                }
            }
        }
    }
}
