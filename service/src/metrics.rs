//! Metrics collection for service monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ratekeeper_fx::RateCacheStats;

/// Service metrics.
#[derive(Default)]
pub struct Metrics {
    /// Refresh attempts, including retries.
    pub refresh_attempts: AtomicU64,
    /// Scheduled refreshes that published a quote.
    pub refresh_success: AtomicU64,
    /// Scheduled refreshes that exhausted their attempts.
    pub refresh_failed: AtomicU64,
    /// Successful registrations.
    pub registrations: AtomicU64,
    /// Rejected registrations (validation, timeout, interruption).
    pub registrations_rejected: AtomicU64,
    /// Registrations that timed out waiting for the update lock.
    pub lock_timeouts: AtomicU64,
    /// Served rate lookups.
    pub rate_lookups: AtomicU64,
    /// Failed rate lookups.
    pub rate_lookups_failed: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_attempted(&self) {
        self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refresh_succeeded(&self) {
        self.refresh_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refresh_failed(&self) {
        self.refresh_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn registration_accepted(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected registration; `timed_out` also bumps the lock timeout counter.
    pub fn registration_rejected(&self, timed_out: bool) {
        self.registrations_rejected.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn rate_lookup(&self, ok: bool) {
        if ok {
            self.rate_lookups.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rate_lookups_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            refresh_attempts: self.refresh_attempts.load(Ordering::Relaxed),
            refresh_success: self.refresh_success.load(Ordering::Relaxed),
            refresh_failed: self.refresh_failed.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            registrations_rejected: self.registrations_rejected.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            rate_lookups: self.rate_lookups.load(Ordering::Relaxed),
            rate_lookups_failed: self.rate_lookups_failed.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format, with cache gauges appended.
    pub fn to_prometheus(&self, cache: &RateCacheStats) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP ratekeeper_refresh_attempts_total Refresh attempts including retries
# TYPE ratekeeper_refresh_attempts_total counter
ratekeeper_refresh_attempts_total {}

# HELP ratekeeper_refresh_success_total Scheduled refreshes that published a quote
# TYPE ratekeeper_refresh_success_total counter
ratekeeper_refresh_success_total {}

# HELP ratekeeper_refresh_failed_total Scheduled refreshes that exhausted their attempts
# TYPE ratekeeper_refresh_failed_total counter
ratekeeper_refresh_failed_total {}

# HELP ratekeeper_registrations_total Currencies registered
# TYPE ratekeeper_registrations_total counter
ratekeeper_registrations_total {}

# HELP ratekeeper_registrations_rejected_total Registrations rejected
# TYPE ratekeeper_registrations_rejected_total counter
ratekeeper_registrations_rejected_total {}

# HELP ratekeeper_lock_timeouts_total Registrations that timed out on the update lock
# TYPE ratekeeper_lock_timeouts_total counter
ratekeeper_lock_timeouts_total {}

# HELP ratekeeper_rate_lookups_total Rate tables served
# TYPE ratekeeper_rate_lookups_total counter
ratekeeper_rate_lookups_total {}

# HELP ratekeeper_rate_lookups_failed_total Rate lookups rejected
# TYPE ratekeeper_rate_lookups_failed_total counter
ratekeeper_rate_lookups_failed_total {}

# HELP ratekeeper_audit_failures_total Quotes the audit sink failed to record
# TYPE ratekeeper_audit_failures_total counter
ratekeeper_audit_failures_total {}

# HELP ratekeeper_tracked_currencies Currently tracked currencies
# TYPE ratekeeper_tracked_currencies gauge
ratekeeper_tracked_currencies {}

# HELP ratekeeper_quote_timestamp_seconds Timestamp of the published quote
# TYPE ratekeeper_quote_timestamp_seconds gauge
ratekeeper_quote_timestamp_seconds {}
"#,
            snapshot.refresh_attempts,
            snapshot.refresh_success,
            snapshot.refresh_failed,
            snapshot.registrations,
            snapshot.registrations_rejected,
            snapshot.lock_timeouts,
            snapshot.rate_lookups,
            snapshot.rate_lookups_failed,
            cache.audit_failures,
            cache.tracked_currencies,
            cache.quote_timestamp.unwrap_or(0),
        )
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub refresh_attempts: u64,
    pub refresh_success: u64,
    pub refresh_failed: u64,
    pub registrations: u64,
    pub registrations_rejected: u64,
    pub lock_timeouts: u64,
    pub rate_lookups: u64,
    pub rate_lookups_failed: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
