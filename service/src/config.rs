//! Service configuration.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use ratekeeper_common::Currency;
use ratekeeper_fx::{RateCacheConfig, MAX_SCALE};

use crate::error::{Result, ServiceError};

/// Refresh scheduling configuration.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between scheduled refreshes.
    pub interval: Duration,
    /// Attempts per scheduled refresh before giving up until the next tick.
    pub max_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// OpenExchangeRates client configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API root, e.g. `https://openexchangerates.org/`.
    pub base_url: String,
    /// Application id sent as `app_id`.
    pub app_id: String,
    /// Base currency requested from the API.
    pub base_currency: Currency,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openexchangerates.org/".to_string(),
            app_id: String::new(),
            base_currency: Currency::usd(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Rate cache configuration.
    pub cache: RateCacheConfig,
    /// Refresh scheduling.
    pub refresh: RefreshConfig,
    /// Quote provider.
    pub provider: ProviderConfig,
    /// Audit database URL; quotes are only logged when unset.
    pub database_url: Option<String>,
    /// Log level.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            cache: RateCacheConfig::default(),
            refresh: RefreshConfig::default(),
            provider: ProviderConfig::default(),
            database_url: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an in-memory map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("RATEKEEPER_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = parse_var(&lookup, "RATEKEEPER_LISTEN_PORT")? {
            config.listen_port = port;
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "RATEKEEPER_LOCK_TIMEOUT_MS")? {
            config.cache.lock_timeout = Duration::from_millis(ms);
        }

        if let Some(scale) = parse_var(&lookup, "RATEKEEPER_SCALE")? {
            config.cache.scale = scale;
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "RATEKEEPER_REFRESH_INTERVAL_SECS")? {
            config.refresh.interval = Duration::from_secs(secs);
        }

        if let Some(attempts) = parse_var(&lookup, "RATEKEEPER_REFRESH_MAX_ATTEMPTS")? {
            config.refresh.max_attempts = attempts;
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "RATEKEEPER_REFRESH_BACKOFF_MS")? {
            config.refresh.retry_backoff = Duration::from_millis(ms);
        }

        if let Some(url) = lookup("OPENEXCHANGERATES_BASE_URL") {
            config.provider.base_url = url;
        }

        if let Some(app_id) = lookup("OPENEXCHANGERATES_APP_ID") {
            config.provider.app_id = app_id;
        }

        if let Some(code) = lookup("OPENEXCHANGERATES_BASE_CURRENCY") {
            config.provider.base_currency = Currency::new(code);
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "OPENEXCHANGERATES_TIMEOUT_MS")? {
            config.provider.request_timeout = Duration::from_millis(ms);
        }

        if let Some(url) = lookup("DATABASE_URL").filter(|url| !url.is_empty()) {
            config.database_url = Some(url);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.listen_port == 0 {
            return Err(ServiceError::Configuration(
                "Listen port cannot be 0".to_string(),
            ));
        }

        if self.cache.scale > MAX_SCALE {
            return Err(ServiceError::Configuration(format!(
                "Scale {} exceeds maximum {}",
                self.cache.scale, MAX_SCALE
            )));
        }

        if self.cache.lock_timeout.is_zero() {
            return Err(ServiceError::Configuration(
                "Lock timeout cannot be zero".to_string(),
            ));
        }

        if self.refresh.interval.is_zero() {
            return Err(ServiceError::Configuration(
                "Refresh interval cannot be zero".to_string(),
            ));
        }

        if self.refresh.max_attempts == 0 {
            return Err(ServiceError::Configuration(
                "Refresh needs at least one attempt".to_string(),
            ));
        }

        if self.provider.base_url.is_empty() {
            return Err(ServiceError::Configuration(
                "Provider base URL cannot be empty".to_string(),
            ));
        }

        if self.provider.base_currency.code().is_empty() {
            return Err(ServiceError::Configuration(
                "Provider base currency cannot be empty".to_string(),
            ));
        }

        if self.provider.app_id.is_empty() {
            return Err(ServiceError::Configuration(
                "OPENEXCHANGERATES_APP_ID must be set".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ServiceError::Configuration(format!("{}={:?}: {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn valid_config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.provider.app_id = "test-app".to_string();
        config
    }

    #[test]
    fn test_default_config_needs_app_id() {
        assert!(ServiceConfig::default().validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_from_map_overrides() {
        let config = ServiceConfig::from_map(&vars(&[
            ("RATEKEEPER_LISTEN_PORT", "9000"),
            ("RATEKEEPER_LOCK_TIMEOUT_MS", "250"),
            ("RATEKEEPER_SCALE", "2"),
            ("RATEKEEPER_REFRESH_INTERVAL_SECS", "60"),
            ("RATEKEEPER_REFRESH_MAX_ATTEMPTS", "5"),
            ("OPENEXCHANGERATES_APP_ID", "abc"),
            ("OPENEXCHANGERATES_BASE_CURRENCY", "EUR"),
            ("DATABASE_URL", "postgres://localhost/rates"),
        ]))
        .unwrap();

        assert_eq!(config.listen_port, 9000);
        assert_eq!(config.cache.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.cache.scale, 2);
        assert_eq!(config.refresh.interval, Duration::from_secs(60));
        assert_eq!(config.refresh.max_attempts, 5);
        assert_eq!(config.provider.base_currency, Currency::eur());
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/rates"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unparseable_value_rejected() {
        let result = ServiceConfig::from_map(&vars(&[("RATEKEEPER_SCALE", "two")]));
        assert!(matches!(result, Err(ServiceError::Configuration(_))));
    }

    #[test]
    fn test_empty_database_url_ignored() {
        let config = ServiceConfig::from_map(&vars(&[("DATABASE_URL", "")])).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = valid_config();
        config.cache.scale = 29;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.refresh.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.listen_port = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.provider.base_currency = Currency::new("");
        assert!(config.validate().is_err());
    }
}
