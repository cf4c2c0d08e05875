//! Request handlers behind the dashboard's HTTP endpoints.
//!
//! These functions take already-extracted query parameters and return
//! serializable payloads; mounting them on a router is left to the host
//! application. Handler errors carry the status code to answer with and
//! serialize as `{"error": "..."}`.

use crate::error::UrbanObsError;
use crate::forecast::{ForecastReport, Forecaster};
use crate::sensor_data::error::FetchError;
use crate::types::reading::{records_from_frame, ReadingRecord};
use crate::urban_observatory::UrbanObservatory;
use log::warn;
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Default span for `/api/data/{variable}`.
pub const DEFAULT_DATA_DAYS: u32 = 1;
/// Default span for `/api/forecast/{variable}`.
pub const DEFAULT_FORECAST_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.error
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.status)
    }
}

impl From<UrbanObsError> for ApiError {
    fn from(err: UrbanObsError) -> Self {
        warn!("Request failed: {}", err);
        match err {
            UrbanObsError::Fetch(FetchError::InvalidDays(_)) => ApiError::bad_request(err.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Status and JSON body ready to be written by whatever server hosts the handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

pub fn respond<T: Serialize>(result: Result<T, ApiError>) -> ApiResponse {
    let (status, body) = match result {
        Ok(payload) => (StatusCode::OK, serde_json::to_value(payload)),
        Err(err) => (err.status(), serde_json::to_value(&err)),
    };
    match body {
        Ok(body) => ApiResponse { status, body },
        Err(e) => ApiResponse {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: serde_json::json!({ "error": e.to_string() }),
        },
    }
}

/// Interprets a query flag the way the dashboard sends it: `true`, `1` or `yes`
/// (any case) switch it on, and an absent flag falls back to `default`.
pub fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw {
        None => default,
        Some(value) => matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
    }
}

/// `GET /api/data/{variable}?days=&remove_outliers=`
pub async fn data(
    client: &UrbanObservatory,
    variable: &str,
    days: Option<u32>,
    remove_outliers: Option<&str>,
) -> Result<Vec<ReadingRecord>, ApiError> {
    let view = client
        .readings()
        .variable(variable)
        .days(days.unwrap_or(DEFAULT_DATA_DAYS))
        .remove_outliers(parse_flag(remove_outliers, true))
        .call()
        .await?;
    records_from_frame(view.frame()).map_err(|e| ApiError::from(UrbanObsError::from(e)))
}

/// `GET /api/forecast/{variable}?days=`
pub async fn forecast<F: Forecaster>(
    client: &UrbanObservatory,
    variable: &str,
    days: Option<u32>,
    forecaster: &F,
) -> Result<ForecastReport, ApiError> {
    Ok(client
        .forecast(variable, days.unwrap_or(DEFAULT_FORECAST_DAYS), forecaster)
        .await?)
}

/// `GET /api/averages?variable=`
///
/// Answers `{variable: mean}`; the mean is `null` when the last day has no readings.
pub async fn averages(
    client: &UrbanObservatory,
    variable: Option<&str>,
) -> Result<BTreeMap<String, Option<f64>>, ApiError> {
    let variable = match variable {
        Some(v) if !v.is_empty() => v,
        _ => return Err(ApiError::bad_request("Variable parameter is required")),
    };
    let mean = client.latest_mean(variable).await?;
    Ok(BTreeMap::from([(variable.to_string(), mean)]))
}
