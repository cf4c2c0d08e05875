//! Hand-off to an external forecasting model, and scoring of what it returns.
//!
//! The crate does no modelling itself. It prepares a cleaned `(ds, y)` series,
//! holds back the most recent fifth of it, asks a [`Forecaster`] to predict that
//! many periods, and reports the mean absolute error on the held-back part.

use crate::cleaning;
use crate::error::UrbanObsError;
use crate::types::reading::{COL_TIMESTAMP, COL_VALUE};
use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const COL_DS: &str = "ds";
pub const COL_Y: &str = "y";

/// Share of the series used for fitting; the rest is held back for scoring.
pub const TRAIN_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ds: String,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub forecast: Vec<ForecastPoint>,
    pub mae: f64,
}

/// A time-series model that can be fitted on a history and extended into the future.
pub trait Forecaster {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fits on `history` (columns `ds`: datetime, `y`: f64) and returns predictions
    /// covering the history followed by `periods` future steps. Only the last
    /// `periods` points are scored.
    fn forecast(&self, history: &DataFrame, periods: usize) -> Result<Vec<ForecastPoint>, Self::Error>;
}

/// Suspect- and outlier-filtered `(ds, y)` series in arrival order.
pub fn prepare_series(raw: &DataFrame) -> Result<DataFrame, UrbanObsError> {
    let cleaned = cleaning::remove_outliers(&cleaning::remove_suspect(raw)?)?;
    Ok(cleaned
        .lazy()
        .select([
            col(COL_TIMESTAMP).alias(COL_DS),
            col(COL_VALUE).cast(DataType::Float64).alias(COL_Y),
        ])
        .collect()?)
}

/// Splits `series` chronologically, runs `forecaster` on the training part and
/// scores it against the held-back part.
pub fn evaluate<F: Forecaster>(
    variable: &str,
    series: &DataFrame,
    forecaster: &F,
) -> Result<ForecastReport, UrbanObsError> {
    let total = series.height();
    let train_size = (TRAIN_FRACTION * total as f64) as usize;
    let test_size = total - train_size;
    if train_size == 0 || test_size == 0 {
        return Err(UrbanObsError::InsufficientData {
            variable: variable.to_string(),
            available: total,
            required: 2,
        });
    }

    let train = series.slice(0, train_size);
    let test = series.slice(train_size as i64, test_size);

    let forecast = forecaster
        .forecast(&train, test_size)
        .map_err(|e| UrbanObsError::Forecast(Box::new(e)))?;
    if forecast.len() < test_size {
        return Err(UrbanObsError::ForecastLength {
            expected: test_size,
            found: forecast.len(),
        });
    }

    let predicted = &forecast[forecast.len() - test_size..];
    let actual = test.column(COL_Y)?.f64()?;
    let abs_error: f64 = actual
        .into_iter()
        .zip(predicted)
        .map(|(y, point)| (y.unwrap_or(f64::NAN) - point.yhat).abs())
        .sum();
    let mae = abs_error / test_size as f64;
    info!("Mean absolute error for {}: {:.2}", variable, mae);

    Ok(ForecastReport { forecast, mae })
}
