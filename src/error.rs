use crate::cleaning::CleanError;
use crate::sensor_data::error::FetchError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UrbanObsError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),

    #[error("Forecaster failed")]
    Forecast(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Forecaster returned {found} points, at least {expected} are needed")]
    ForecastLength { expected: usize, found: usize },

    #[error("Not enough readings for '{variable}': {available} available, {required} required")]
    InsufficientData {
        variable: String,
        available: usize,
        required: usize,
    },
}
