//! FX error types.

use ratekeeper_common::Currency;
use thiserror::Error;

/// Errors produced by the rate cache and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FxError {
    /// No quote has been fetched yet.
    #[error("Exchange rates service is not initialized yet")]
    NotInitialized,

    /// The latest quote carries no rates.
    #[error("Exchange rates are unavailable")]
    RatesUnavailable,

    /// Code is not a key of the latest quote.
    #[error("Currency code is not supported: {0}")]
    UnsupportedCurrency(Currency),

    /// Code is supported but was never registered.
    #[error("Currency code is not added to exchange service: {0}")]
    NotTracked(Currency),

    /// The write lock could not be acquired in time.
    #[error("Unable to acquire update lock within {timeout_ms}ms")]
    LockTimeout { timeout_ms: u64 },

    /// Waiting for the write lock was cancelled.
    #[error("Interrupted while waiting for update lock")]
    LockInterrupted,

    /// The quote source failed; message is passed through verbatim.
    #[error("Quote source error: {0}")]
    SourceFetchFailed(String),
}

impl FxError {
    /// Check if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FxError::NotInitialized
                | FxError::LockTimeout { .. }
                | FxError::LockInterrupted
                | FxError::SourceFetchFailed(_)
        )
    }

    /// Whether the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FxError::UnsupportedCurrency(_) | FxError::NotTracked(_)
        )
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::NotInitialized => "NOT_INITIALIZED",
            FxError::RatesUnavailable => "RATES_UNAVAILABLE",
            FxError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            FxError::NotTracked(_) => "NOT_TRACKED",
            FxError::LockTimeout { .. } => "LOCK_TIMEOUT",
            FxError::LockInterrupted => "LOCK_INTERRUPTED",
            FxError::SourceFetchFailed(_) => "SOURCE_FETCH_FAILED",
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
