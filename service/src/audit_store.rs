//! Postgres audit trail of fetched quotes.
//!
//! Every quote becomes one `currency_rate` row plus one `exchange_rate` row
//! per currency, written in a single transaction.

use async_trait::async_trait;
use chrono::Utc;
use ratekeeper_common::Quote;
use ratekeeper_fx::{AuditError, AuditSink};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, instrument};

use crate::error::{Result, ServiceError};

const CREATE_CURRENCY_RATE: &str = r#"
CREATE TABLE IF NOT EXISTS currency_rate (
    id            BIGSERIAL PRIMARY KEY,
    timestamp     BIGINT      NOT NULL,
    base_currency VARCHAR(10) NOT NULL,
    recorded_at   TIMESTAMPTZ NOT NULL
)"#;

const CREATE_EXCHANGE_RATE: &str = r#"
CREATE TABLE IF NOT EXISTS exchange_rate (
    id               BIGSERIAL PRIMARY KEY,
    currency_rate_id BIGINT      NOT NULL REFERENCES currency_rate (id) ON DELETE CASCADE,
    currency         VARCHAR(10) NOT NULL,
    rate             NUMERIC     NOT NULL
)"#;

const INSERT_CURRENCY_RATE: &str = "INSERT INTO currency_rate (timestamp, base_currency, recorded_at) \
     VALUES ($1, $2, $3) RETURNING id";

const INSERT_EXCHANGE_RATE: &str =
    "INSERT INTO exchange_rate (currency_rate_id, currency, rate) VALUES ($1, $2, $3)";

/// One `exchange_rate` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRateRow {
    pub currency: String,
    pub rate: Decimal,
}

/// Rows written for `quote`, ordered by currency code.
pub fn exchange_rate_rows(quote: &Quote) -> Vec<ExchangeRateRow> {
    quote
        .rates()
        .iter()
        .map(|(currency, rate)| ExchangeRateRow {
            currency: currency.code().to_string(),
            rate: *rate,
        })
        .collect()
}

/// Audit sink persisting quotes to Postgres.
pub struct PostgresAuditSink {
    pool: PgPool,
}

impl PostgresAuditSink {
    /// Connect to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        info!("Connected to audit database");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the audit tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in [CREATE_CURRENCY_RATE, CREATE_EXCHANGE_RATE] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| ServiceError::Database(e.to_string()))?;
        }
        debug!("Audit schema ready");
        Ok(())
    }

    async fn insert(&self, quote: &Quote) -> std::result::Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(INSERT_CURRENCY_RATE)
            .bind(quote.timestamp())
            .bind(quote.base().code())
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

        for row in exchange_rate_rows(quote) {
            sqlx::query(INSERT_EXCHANGE_RATE)
                .bind(id)
                .bind(row.currency)
                .bind(row.rate)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(id)
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    fn name(&self) -> &str {
        "postgres"
    }

    #[instrument(skip(self, quote), fields(quote_timestamp = quote.timestamp()))]
    async fn record(&self, quote: &Quote) -> std::result::Result<(), AuditError> {
        let id = self
            .insert(quote)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;

        debug!(currency_rate_id = id, rows = quote.len(), "Quote persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratekeeper_common::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exchange_rate_rows() {
        let quote = Quote::new(
            12345,
            Currency::usd(),
            vec![(Currency::usd(), dec!(1)), (Currency::eur(), dec!(0.93))],
        )
        .unwrap();

        let rows = exchange_rate_rows(&quote);
        assert_eq!(
            rows,
            vec![
                ExchangeRateRow {
                    currency: "EUR".to_string(),
                    rate: dec!(0.93),
                },
                ExchangeRateRow {
                    currency: "USD".to_string(),
                    rate: dec!(1),
                },
            ]
        );
    }

    #[test]
    fn test_insert_statements_match_schema() {
        assert!(CREATE_EXCHANGE_RATE.contains("REFERENCES currency_rate"));
        assert!(INSERT_CURRENCY_RATE.contains("RETURNING id"));
        assert_eq!(INSERT_EXCHANGE_RATE.matches('$').count(), 3);
    }
}
