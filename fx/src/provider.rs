//! Quote source trait and test double.

use async_trait::async_trait;
use ratekeeper_common::Quote;

use crate::error::FxResult;

/// A source of quote snapshots (e.g. a remote rates API).
///
/// Implementations return either a complete [`Quote`] or
/// [`FxError::SourceFetchFailed`](crate::FxError::SourceFetchFailed); a
/// partial quote is never returned.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch the latest quote.
    async fn fetch(&self) -> FxResult<Quote>;
}

/// Scripted quote source for testing.
///
/// Responses are served in order; the last one repeats once the script is
/// exhausted.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockQuoteSource {
    name: String,
    script: parking_lot::Mutex<std::collections::VecDeque<Result<Quote, String>>>,
    fetches: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockQuoteSource {
    /// Create a new mock source with an empty script.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            fetches: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Create a mock source that always returns `quote`.
    pub fn with_quote(quote: Quote) -> Self {
        let source = Self::new("mock");
        source.push_quote(quote);
        source
    }

    /// Append a successful response.
    pub fn push_quote(&self, quote: Quote) {
        self.script.lock().push_back(Ok(quote));
    }

    /// Append a failing response.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script.lock().push_back(Err(message.into()));
    }

    /// Drop the script and serve only `quote` from now on.
    pub fn set_quote(&self, quote: Quote) {
        let mut script = self.script.lock();
        script.clear();
        script.push_back(Ok(quote));
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl QuoteSource for MockQuoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> FxResult<Quote> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let mut script = self.script.lock();
        let response = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };

        match response {
            Some(Ok(quote)) => Ok(quote),
            Some(Err(message)) => Err(crate::FxError::SourceFetchFailed(message)),
            None => Err(crate::FxError::SourceFetchFailed(
                "no quote scripted".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FxError;
    use ratekeeper_common::Currency;
    use rust_decimal_macros::dec;

    fn quote(timestamp: i64) -> Quote {
        Quote::new(timestamp, Currency::usd(), vec![(Currency::usd(), dec!(1))]).unwrap()
    }

    #[tokio::test]
    async fn test_mock_source_script_order() {
        let source = MockQuoteSource::new("test");
        source.push_failure("offline");
        source.push_quote(quote(1));
        source.push_quote(quote(2));

        assert_eq!(
            source.fetch().await,
            Err(FxError::SourceFetchFailed("offline".to_string()))
        );
        assert_eq!(source.fetch().await.unwrap().timestamp(), 1);
        assert_eq!(source.fetch().await.unwrap().timestamp(), 2);
        // Last response repeats
        assert_eq!(source.fetch().await.unwrap().timestamp(), 2);
        assert_eq!(source.fetch_count(), 4);
    }

    #[tokio::test]
    async fn test_mock_source_empty_script_fails() {
        let source = MockQuoteSource::new("empty");
        assert!(matches!(
            source.fetch().await,
            Err(FxError::SourceFetchFailed(_))
        ));
    }
}
