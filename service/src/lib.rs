//! Ratekeeper Service
//!
//! Deployable exchange rate service: keeps a [`RateCache`](ratekeeper_fx::RateCache)
//! refreshed from OpenExchangeRates, records every quote to an audit store
//! and serves registration and cross-rate lookups over HTTP.

pub mod audit_store;
pub mod config;
pub mod error;
pub mod metrics;
pub mod openexchangerates;
pub mod routes;
pub mod scheduler;
pub mod service;
pub mod state;

pub use audit_store::PostgresAuditSink;
pub use config::{ProviderConfig, RefreshConfig, ServiceConfig};
pub use error::{Result, ServiceError};
pub use openexchangerates::OpenExchangeRatesSource;
pub use routes::router;
pub use service::{HealthReport, RateService};
pub use state::ServiceState;
