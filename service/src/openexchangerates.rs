//! OpenExchangeRates quote source.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ratekeeper_common::{Currency, Quote};
use ratekeeper_fx::{FxError, FxResult, QuoteSource};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::ProviderConfig;
use crate::error::{Result, ServiceError};

/// Body of `GET api/latest.json`.
#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    timestamp: i64,
    base: String,
    rates: BTreeMap<String, Decimal>,
}

impl LatestRatesResponse {
    fn into_quote(self) -> std::result::Result<Quote, String> {
        let rates = self
            .rates
            .into_iter()
            .map(|(code, rate)| (Currency::new(code), rate));

        Quote::new(self.timestamp, Currency::new(self.base), rates).map_err(|e| e.to_string())
    }
}

/// Fetches the latest rates from the OpenExchangeRates API.
pub struct OpenExchangeRatesSource {
    client: reqwest::Client,
    latest_url: Url,
    host: String,
}

impl OpenExchangeRatesSource {
    /// Create a new source from provider configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut latest_url = Url::parse(&config.base_url)
            .and_then(|base| base.join("api/latest.json"))
            .map_err(|e| {
                ServiceError::Configuration(format!("Invalid provider URL {}: {}", config.base_url, e))
            })?;

        latest_url
            .query_pairs_mut()
            .append_pair("app_id", &config.app_id)
            .append_pair("base", config.base_currency.code());

        let host = latest_url.host_str().unwrap_or("unknown").to_string();

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::Configuration(format!("HTTP client: {}", e)))?;

        info!(
            host = %host,
            base = %config.base_currency,
            timeout_ms = config.request_timeout.as_millis() as u64,
            "Initialized OpenExchangeRates source"
        );

        Ok(Self {
            client,
            latest_url,
            host,
        })
    }

    fn failure(&self, detail: impl std::fmt::Display) -> FxError {
        let message = format!("Unable to get exchange rates from {}: {}", self.host, detail);
        error!(host = %self.host, error = %detail, "Exchange rate fetch failed");
        FxError::SourceFetchFailed(message)
    }
}

#[async_trait]
impl QuoteSource for OpenExchangeRatesSource {
    fn name(&self) -> &str {
        "openexchangerates"
    }

    async fn fetch(&self) -> FxResult<Quote> {
        debug!(host = %self.host, "Fetching latest exchange rates");

        // without_url keeps the app id out of error messages
        let response = self
            .client
            .get(self.latest_url.clone())
            .send()
            .await
            .map_err(|e| self.failure(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failure(format!("response code: {}", status)));
        }

        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|e| self.failure(e.without_url()))?;

        let quote = body.into_quote().map_err(|e| self.failure(e))?;

        info!(
            quote_timestamp = quote.timestamp(),
            base = %quote.base(),
            currencies = quote.len(),
            "Fetched exchange rates"
        );

        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Duration;

    const SAMPLE: &str = r#"{
        "disclaimer": "Usage subject to terms",
        "license": "https://openexchangerates.org/license",
        "timestamp": 12345,
        "base": "USD",
        "rates": {"USD": 1, "EUR": 0.93, "UAH": 41.15, "GBP": 0.77}
    }"#;

    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn provider_config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            base_url,
            app_id: "secret-app-id".to_string(),
            base_currency: Currency::usd(),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_response_into_quote() {
        let response: LatestRatesResponse = serde_json::from_str(SAMPLE).unwrap();
        let quote = response.into_quote().unwrap();

        assert_eq!(quote.timestamp(), 12345);
        assert_eq!(quote.base(), &Currency::usd());
        assert_eq!(quote.rate(&Currency::eur()), Some(dec!(0.93)));
        assert_eq!(quote.rate(&Currency::usd()), Some(dec!(1)));
        assert_eq!(quote.len(), 4);
    }

    #[test]
    fn test_provider_codes_kept_verbatim() {
        let raw = r#"{"timestamp": 1, "base": "USD", "rates": {"USD": 1, "BTC-USD": 0.00002, "eur": 0.9}}"#;
        let response: LatestRatesResponse = serde_json::from_str(raw).unwrap();
        let quote = response.into_quote().unwrap();

        assert_eq!(quote.len(), 3);
        assert!(quote.supports(&Currency::new("BTC-USD")));
        assert!(quote.supports(&Currency::new("eur")));
        assert!(!quote.supports(&Currency::eur()));
    }

    #[test]
    fn test_response_with_bad_rate_rejected() {
        let raw = r#"{"timestamp": 1, "base": "USD", "rates": {"USD": 1, "EUR": -2}}"#;
        let response: LatestRatesResponse = serde_json::from_str(raw).unwrap();
        assert!(response.into_quote().is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let result = OpenExchangeRatesSource::new(&provider_config("not a url".to_string()));
        assert!(matches!(result, Err(ServiceError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_fetch_from_upstream() {
        let app = Router::new().route(
            "/api/latest.json",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("app_id").map(String::as_str), Some("secret-app-id"));
                assert_eq!(params.get("base").map(String::as_str), Some("USD"));
                Json(serde_json::from_str::<serde_json::Value>(SAMPLE).unwrap())
            }),
        );
        let base_url = spawn_upstream(app).await;

        let source = OpenExchangeRatesSource::new(&provider_config(base_url)).unwrap();
        let quote = source.fetch().await.unwrap();

        assert_eq!(quote.timestamp(), 12345);
        assert_eq!(quote.rate(&Currency::uah()), Some(dec!(41.15)));
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let app = Router::new().route(
            "/api/latest.json",
            get(|| async { (StatusCode::UNAUTHORIZED, "invalid app id") }),
        );
        let base_url = spawn_upstream(app).await;

        let source = OpenExchangeRatesSource::new(&provider_config(base_url)).unwrap();
        let err = source.fetch().await.unwrap_err();

        match err {
            FxError::SourceFetchFailed(message) => {
                assert!(message.contains("401"));
                assert!(message.contains("127.0.0.1"));
                assert!(!message.contains("secret-app-id"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_fails() {
        let app = Router::new().route("/api/latest.json", get(|| async { "not json" }));
        let base_url = spawn_upstream(app).await;

        let source = OpenExchangeRatesSource::new(&provider_config(base_url)).unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(FxError::SourceFetchFailed(_))
        ));
    }
}
