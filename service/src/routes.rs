//! HTTP API.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ratekeeper_common::{CrossRateTable, Currency};
use ratekeeper_fx::FxError;

use crate::error::ServiceError;
use crate::service::{HealthReport, RateService};
use crate::state::ServiceState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Build the API router.
pub fn router(service: Arc<RateService>) -> Router {
    Router::new()
        .route("/currencies", get(list_currencies).post(register_currency))
        .route("/exchange-rates", get(exchange_rates))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    code: String,
}

#[derive(Debug, Deserialize)]
struct RatesQuery {
    base: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    Fx(FxError),
    Unavailable(ServiceState),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Fx(e) => ApiError::Fx(e),
            ServiceError::NotAccepting(state) => ApiError::Unavailable(state),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Fx(e) => match e {
                FxError::UnsupportedCurrency(_) => StatusCode::BAD_REQUEST,
                FxError::NotTracked(_) => StatusCode::NOT_FOUND,
                FxError::NotInitialized
                | FxError::RatesUnavailable
                | FxError::LockTimeout { .. }
                | FxError::LockInterrupted => StatusCode::SERVICE_UNAVAILABLE,
                FxError::SourceFetchFailed(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Fx(e) => ErrorBody {
                code: e.error_code(),
                message: e.to_string(),
            },
            ApiError::Unavailable(state) => ErrorBody {
                code: "SERVICE_UNAVAILABLE",
                message: format!("Service is not accepting requests while {:?}", state),
            },
            ApiError::Internal(message) => ErrorBody {
                code: "INTERNAL_ERROR",
                message: message.clone(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        debug!(status = status.as_u16(), code = body.code, "Request rejected");
        (status, Json(body)).into_response()
    }
}

async fn list_currencies(State(service): State<Arc<RateService>>) -> Json<BTreeSet<Currency>> {
    Json(service.list_currencies())
}

async fn register_currency(
    State(service): State<Arc<RateService>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<BTreeSet<Currency>>), ApiError> {
    let tracked = service
        .register_currency(&Currency::new(request.code))
        .await?;
    Ok((StatusCode::CREATED, Json(tracked)))
}

async fn exchange_rates(
    State(service): State<Arc<RateService>>,
    Query(query): Query<RatesQuery>,
) -> Result<Json<CrossRateTable>, ApiError> {
    let base = query.base.map(Currency::new).unwrap_or_else(Currency::usd);
    let table = service.get_rates(&base)?;
    Ok(Json(table.as_ref().clone()))
}

async fn health(State(service): State<Arc<RateService>>) -> Json<HealthReport> {
    Json(service.health())
}

async fn metrics(State(service): State<Arc<RateService>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        service.prometheus(),
    )
}
