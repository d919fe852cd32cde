//! Audit sink for fetched quotes.
//!
//! The cache hands every successfully fetched quote to an [`AuditSink`] after
//! publishing it. Sink failures never affect cache state.

use async_trait::async_trait;
use ratekeeper_common::Quote;
use thiserror::Error;
use tracing::info;

/// Errors raised by audit sinks.
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    /// Backing store rejected or failed the write.
    #[error("Audit storage error: {0}")]
    Storage(String),
}

/// Receives each fetched quote for persistence.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Get the sink name.
    fn name(&self) -> &str;

    /// Record one quote.
    async fn record(&self, quote: &Quote) -> Result<(), AuditError>;
}

/// Sink that writes each quote to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn record(&self, quote: &Quote) -> Result<(), AuditError> {
        info!(
            quote_timestamp = quote.timestamp(),
            base = %quote.base(),
            currencies = quote.len(),
            "Recorded exchange rate quote"
        );
        Ok(())
    }
}

/// Capturing sink for testing.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MockAuditSink {
    recorded: parking_lot::Mutex<Vec<Quote>>,
    failure: parking_lot::Mutex<Option<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockAuditSink {
    /// Create a new sink that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `record` call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Quotes recorded so far, including ones whose write failed.
    pub fn recorded(&self) -> Vec<Quote> {
        self.recorded.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl AuditSink for MockAuditSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn record(&self, quote: &Quote) -> Result<(), AuditError> {
        self.recorded.lock().push(quote.clone());
        match self.failure.lock().as_ref() {
            Some(message) => Err(AuditError::Storage(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratekeeper_common::Currency;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_sink_captures_and_fails() {
        let sink = MockAuditSink::new();
        let quote = Quote::new(7, Currency::usd(), vec![(Currency::usd(), dec!(1))]).unwrap();

        tokio_test::assert_ok!(sink.record(&quote).await);

        sink.fail_with("disk full");
        tokio_test::assert_err!(sink.record(&quote).await);

        assert_eq!(sink.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts() {
        let quote = Quote::new(7, Currency::usd(), Vec::new()).unwrap();
        assert!(TracingAuditSink.record(&quote).await.is_ok());
    }
}
