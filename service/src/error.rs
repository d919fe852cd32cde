//! Service-level error types.

use ratekeeper_fx::FxError;
use thiserror::Error;

use crate::state::ServiceState;

/// Errors raised while configuring, starting or stopping the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Audit database unreachable or rejected a statement.
    #[error("Database error: {0}")]
    Database(String),

    /// Operation not allowed in the current lifecycle state.
    #[error("Invalid service state: {0}")]
    InvalidState(String),

    /// Request arrived while the service is not running.
    #[error("Service is not accepting requests while {0:?}")]
    NotAccepting(ServiceState),

    /// Socket or filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rate cache error.
    #[error(transparent)]
    Fx(#[from] FxError),
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
