//! Ratekeeper FX Cache
//!
//! In-memory, periodically refreshed table of exchange rates serving
//! cross-rate conversions between registered currencies.
//!
//! # Features
//!
//! - Copy-on-write publication: readers never block and never see a
//!   half-updated table set
//! - Bounded-wait currency registration, unbounded-wait refresh
//! - Half-up rounding to a configured scale with trailing zeros stripped
//! - Pluggable quote sources and audit sinks
//!
//! # Example
//!
//! ```rust,ignore
//! use ratekeeper_fx::{RateCache, RateCacheConfig, TracingAuditSink};
//! use ratekeeper_common::Currency;
//!
//! let cache = RateCache::new(source, Arc::new(TracingAuditSink), RateCacheConfig::default());
//!
//! cache.refresh().await?;
//! cache.register_currency(&Currency::eur()).await?;
//! let table = cache.get_rates(&Currency::eur())?;
//! ```

pub mod audit;
pub mod cache;
pub mod cross_rate;
pub mod error;
pub mod provider;

pub use audit::{AuditError, AuditSink, TracingAuditSink};
pub use cache::{RateCache, RateCacheConfig, RateCacheStats, SharedRateCache};
pub use cross_rate::{CrossRateTables, MAX_SCALE};
pub use error::{FxError, FxResult};
pub use provider::QuoteSource;

#[cfg(any(test, feature = "test-utils"))]
pub use audit::MockAuditSink;
#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockQuoteSource;
