//! Cross-rate derivation from a single reference quote.
//!
//! `rate(B -> X) = quote[X] / quote[B]`, rounded half-up to the configured
//! scale with trailing zeros stripped. Everything here is a pure function of
//! `(quote, tracked, scale)`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use ratekeeper_common::{CrossRateTable, Currency, Quote};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

/// Largest scale rust_decimal can represent.
pub const MAX_SCALE: u32 = 28;

/// `dividend / divisor` rounded half-up to `scale` places.
///
/// Division first yields 28 significant digits, which can round a quotient
/// lying just below a midpoint onto it. Such ties are settled against the
/// exact operands.
pub fn divide_half_up(dividend: Decimal, divisor: Decimal, scale: u32) -> Option<Decimal> {
    let quotient = dividend.checked_div(divisor)?;
    let rounded = quotient.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    if scale >= MAX_SCALE {
        return Some(rounded);
    }

    let truncated = quotient.round_dp_with_strategy(scale, RoundingStrategy::ToZero);
    if (quotient - truncated).abs() == Decimal::new(5, scale + 1) {
        if let Some(product) = quotient.checked_mul(divisor) {
            // quotient overshoots the exact value, so the tie is not real
            if product.abs() > dividend.abs() {
                return Some(truncated);
            }
        }
    }

    Some(rounded)
}

/// Rate of `target` expressed in units of `base`, trailing zeros stripped.
pub fn cross_rate(
    quote: &Quote,
    base: &Currency,
    target: &Currency,
    scale: u32,
) -> Option<Decimal> {
    let base_rate = quote.rate(base)?;
    let target_rate = quote.rate(target)?;
    divide_half_up(target_rate, base_rate, scale).map(|value| value.normalize())
}

/// Build the table for one base over the tracked set.
///
/// Returns `None` when `base` is not in the quote. Tracked targets missing
/// from the quote are left out of the table.
pub fn derive_table(
    quote: &Quote,
    base: &Currency,
    tracked: &BTreeSet<Currency>,
    scale: u32,
) -> Option<CrossRateTable> {
    if !quote.supports(base) {
        return None;
    }

    let rates: BTreeMap<Currency, Decimal> = tracked
        .iter()
        .filter_map(|target| cross_rate(quote, base, target, scale).map(|r| (target.clone(), r)))
        .collect();

    Some(CrossRateTable::new(quote.timestamp(), base.clone(), rates))
}

/// The complete published set of cross-rate tables, one per tracked base.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossRateTables {
    timestamp: Option<i64>,
    tables: HashMap<Currency, Arc<CrossRateTable>>,
}

impl CrossRateTables {
    /// An empty table set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Derive every table for `tracked` from `quote`.
    pub fn derive(quote: &Quote, tracked: &BTreeSet<Currency>, scale: u32) -> Self {
        let mut tables = HashMap::with_capacity(tracked.len());

        for base in tracked {
            match derive_table(quote, base, tracked, scale) {
                Some(table) => {
                    tables.insert(base.clone(), Arc::new(table));
                }
                None => {
                    warn!(
                        currency = %base,
                        quote_timestamp = quote.timestamp(),
                        "Tracked currency missing from quote, no table built"
                    );
                }
            }
        }

        Self {
            timestamp: Some(quote.timestamp()),
            tables,
        }
    }

    /// Table for `base`, if one was built.
    pub fn get(&self, base: &Currency) -> Option<Arc<CrossRateTable>> {
        self.tables.get(base).cloned()
    }

    /// Quote timestamp shared by all tables; `None` when never derived.
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
