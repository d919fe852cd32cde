//! The exchange rate cache.
//!
//! Holds the latest quote, the set of tracked currencies and the cross-rate
//! tables derived from both. All three are published together as one
//! immutable `RateSnapshot`: readers clone an `Arc` and never observe a
//! partially updated state, writers build a replacement and swap it in.
//!
//! Writers (registration and refresh) serialize through a single
//! `tokio::sync::Mutex`, which hands the lock out in FIFO order.
//! Registration waits at most [`RateCacheConfig::lock_timeout`]; refresh
//! waits without bound and is never skipped.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use ratekeeper_common::{CrossRateTable, Currency, Quote};
use serde::Serialize;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::audit::AuditSink;
use crate::cross_rate::CrossRateTables;
use crate::error::{FxError, FxResult};
use crate::provider::QuoteSource;

/// Configuration for the rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Maximum wait for the write lock when registering a currency.
    pub lock_timeout: Duration,
    /// Decimal places kept in derived rates.
    pub scale: u32,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(1),
            scale: 6,
        }
    }
}

/// One consistent view of the cache.
#[derive(Debug, Default)]
struct RateSnapshot {
    quote: Option<Arc<Quote>>,
    tracked: BTreeSet<Currency>,
    tables: CrossRateTables,
}

impl RateSnapshot {
    /// Check `code` against the latest quote.
    ///
    /// Precedence: not initialized, then empty rates, then unknown code.
    fn validate(&self, code: &Currency) -> FxResult<&Arc<Quote>> {
        let quote = self.quote.as_ref().ok_or(FxError::NotInitialized)?;

        if quote.is_empty() {
            return Err(FxError::RatesUnavailable);
        }

        if !quote.supports(code) {
            return Err(FxError::UnsupportedCurrency(code.clone()));
        }

        Ok(quote)
    }
}

/// Thread-safe exchange rate cache.
pub struct RateCache {
    source: Arc<dyn QuoteSource>,
    audit: Arc<dyn AuditSink>,
    config: RateCacheConfig,
    published: RwLock<Arc<RateSnapshot>>,
    update_lock: Mutex<()>,
    interrupt: watch::Sender<bool>,
    audit_failures: AtomicU64,
}

impl RateCache {
    /// Create a new, uninitialized cache.
    pub fn new(
        source: Arc<dyn QuoteSource>,
        audit: Arc<dyn AuditSink>,
        config: RateCacheConfig,
    ) -> Self {
        let (interrupt, _) = watch::channel(false);
        Self {
            source,
            audit,
            config,
            published: RwLock::new(Arc::new(RateSnapshot::default())),
            update_lock: Mutex::new(()),
            interrupt,
            audit_failures: AtomicU64::new(0),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &RateCacheConfig {
        &self.config
    }

    /// Currently tracked currencies.
    pub fn list_currencies(&self) -> BTreeSet<Currency> {
        self.snapshot().tracked.clone()
    }

    /// Start tracking `code` and return the resulting tracked set.
    #[instrument(skip(self, code), fields(currency = %code))]
    pub async fn register_currency(&self, code: &Currency) -> FxResult<BTreeSet<Currency>> {
        {
            let snapshot = self.snapshot();
            snapshot.validate(code)?;
            if snapshot.tracked.contains(code) {
                debug!("Currency already tracked");
                return Ok(snapshot.tracked.clone());
            }
        }

        let _guard = self.acquire_for_registration().await?;

        // A refresh may have landed while we waited.
        let current = self.snapshot();
        let quote = current.validate(code)?.clone();
        if current.tracked.contains(code) {
            return Ok(current.tracked.clone());
        }

        let mut tracked = current.tracked.clone();
        tracked.insert(code.clone());
        let tables = CrossRateTables::derive(&quote, &tracked, self.config.scale);

        self.publish(RateSnapshot {
            quote: Some(quote),
            tracked: tracked.clone(),
            tables,
        });

        info!(tracked = tracked.len(), "Registered currency");
        Ok(tracked)
    }

    /// Cross-rate table for `base`.
    pub fn get_rates(&self, base: &Currency) -> FxResult<Arc<CrossRateTable>> {
        let snapshot = self.snapshot();
        snapshot.validate(base)?;
        snapshot
            .tables
            .get(base)
            .ok_or_else(|| FxError::NotTracked(base.clone()))
    }

    /// Fetch a new quote, publish it and hand it to the audit sink.
    ///
    /// Source failures are returned untouched and leave the cache as it was.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn refresh(&self) -> FxResult<Arc<Quote>> {
        let quote = Arc::new(self.source.fetch().await?);

        {
            let _guard = self.update_lock.lock().await;
            let current = self.snapshot();

            let tables = if current.tracked.is_empty() {
                CrossRateTables::empty()
            } else {
                CrossRateTables::derive(&quote, &current.tracked, self.config.scale)
            };

            self.publish(RateSnapshot {
                quote: Some(quote.clone()),
                tracked: current.tracked.clone(),
                tables,
            });
        }

        info!(
            quote_timestamp = quote.timestamp(),
            base = %quote.base(),
            currencies = quote.len(),
            "Exchange rates refreshed"
        );

        if let Err(e) = self.audit.record(&quote).await {
            self.audit_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                sink = self.audit.name(),
                error = %e,
                "Failed to record quote"
            );
        }

        Ok(quote)
    }

    /// Fail every current and future registration wait with
    /// [`FxError::LockInterrupted`].
    pub fn interrupt_waiters(&self) {
        self.interrupt.send_replace(true);
        debug!("Interrupted update lock waiters");
    }

    /// Whether a quote has been published.
    pub fn is_initialized(&self) -> bool {
        self.snapshot().quote.is_some()
    }

    /// Latest published quote.
    pub fn latest_quote(&self) -> Option<Arc<Quote>> {
        self.snapshot().quote.clone()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> RateCacheStats {
        let snapshot = self.snapshot();
        RateCacheStats {
            initialized: snapshot.quote.is_some(),
            quote_timestamp: snapshot.quote.as_ref().map(|q| q.timestamp()),
            quote_base: snapshot.quote.as_ref().map(|q| q.base().clone()),
            tracked_currencies: snapshot.tracked.len(),
            tables: snapshot.tables.len(),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
        }
    }

    fn snapshot(&self) -> Arc<RateSnapshot> {
        self.published.read().clone()
    }

    fn publish(&self, snapshot: RateSnapshot) {
        *self.published.write() = Arc::new(snapshot);
    }

    async fn acquire_for_registration(&self) -> FxResult<MutexGuard<'_, ()>> {
        let mut interrupt = self.interrupt.subscribe();
        if *interrupt.borrow() {
            return Err(FxError::LockInterrupted);
        }

        tokio::select! {
            acquired = tokio::time::timeout(self.config.lock_timeout, self.update_lock.lock()) => {
                acquired.map_err(|_| {
                    warn!(timeout_ms = self.timeout_ms(), "Timed out waiting for update lock");
                    FxError::LockTimeout { timeout_ms: self.timeout_ms() }
                })
            }
            _ = interrupt.wait_for(|interrupted| *interrupted) => Err(FxError::LockInterrupted),
        }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.config.lock_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RateCacheStats {
    pub initialized: bool,
    pub quote_timestamp: Option<i64>,
    pub quote_base: Option<Currency>,
    pub tracked_currencies: usize,
    pub tables: usize,
    pub audit_failures: u64,
}

/// Shared rate cache.
pub type SharedRateCache = Arc<RateCache>;
