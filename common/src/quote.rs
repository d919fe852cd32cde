//! Quote snapshots and derived cross-rate tables.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Currency, QuoteError};

/// One timestamped snapshot of rates for every known currency against a
/// single source base currency.
///
/// Quotes are immutable once built; a refresh replaces the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    /// Seconds since the Unix epoch, as reported by the source.
    timestamp: i64,
    /// Source base currency.
    base: Currency,
    /// Rate of each currency against `base`.
    rates: BTreeMap<Currency, Decimal>,
}

impl Quote {
    /// Build a quote, rejecting zero or negative rates.
    pub fn new(
        timestamp: i64,
        base: Currency,
        rates: impl IntoIterator<Item = (Currency, Decimal)>,
    ) -> Result<Self, QuoteError> {
        let rates: BTreeMap<Currency, Decimal> = rates.into_iter().collect();

        if let Some((currency, rate)) = rates.iter().find(|(_, rate)| **rate <= Decimal::ZERO) {
            return Err(QuoteError::NonPositiveRate {
                currency: currency.clone(),
                rate: *rate,
            });
        }

        Ok(Self {
            timestamp,
            base,
            rates,
        })
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn base(&self) -> &Currency {
        &self.base
    }

    pub fn rates(&self) -> &BTreeMap<Currency, Decimal> {
        &self.rates
    }

    /// Rate of `currency` against the quote base, if known.
    pub fn rate(&self, currency: &Currency) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }

    /// Whether `currency` is a key of the rate table.
    pub fn supports(&self, currency: &Currency) -> bool {
        self.rates.contains_key(currency)
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }
}

/// Rates of the tracked currencies relative to one base currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossRateTable {
    /// Timestamp of the quote the table was derived from.
    pub timestamp: i64,
    /// Currency the rates are expressed against.
    pub base_currency: Currency,
    /// Rate of each tracked currency against `base_currency`.
    pub rates: BTreeMap<Currency, Decimal>,
}

impl CrossRateTable {
    /// Create a new table.
    pub fn new(timestamp: i64, base_currency: Currency, rates: BTreeMap<Currency, Decimal>) -> Self {
        Self {
            timestamp,
            base_currency,
            rates,
        }
    }

    /// Rate of `currency` against the table base.
    pub fn rate(&self, currency: &Currency) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }
}
