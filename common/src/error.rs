//! Error types for the shared data model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::Currency;

/// Errors raised while building quotes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// A quote carried a zero or negative rate.
    #[error("Non-positive rate {rate} for {currency}")]
    NonPositiveRate { currency: Currency, rate: Decimal },
}
