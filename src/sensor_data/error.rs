use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("A request must span at least one day, got {0}")]
    InvalidDays(u32),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Remote service at {0} is down for maintenance")]
    Maintenance(String),

    #[error("Failed to parse CSV data returned for '{variable}'")]
    CsvParse {
        variable: String,
        #[source]
        source: PolarsError,
    },

    #[error("Response for '{variable}' is not a reading table, missing columns: {missing:?}")]
    UnexpectedSchema {
        variable: String,
        missing: Vec<String>,
    },

    #[error("Failed to write snapshot '{0}'")]
    SnapshotWriteIo(PathBuf, #[source] std::io::Error),
    #[error("Encoding error writing snapshot '{0}'")]
    SnapshotWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to read snapshot '{0}'")]
    SnapshotRead(PathBuf, #[source] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Data not available for '{variable}' ({days} days): remote fetch failed and no usable local snapshot was found")]
    DataUnavailable {
        variable: String,
        days: u32,
        #[source]
        cause: Box<FetchError>,
    },
}

impl FetchError {
    /// Failures of the remote source that the snapshot fallback recovers from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::NetworkRequest(..)
                | FetchError::HttpStatus { .. }
                | FetchError::Maintenance(_)
                | FetchError::CsvParse { .. }
                | FetchError::UnexpectedSchema { .. }
                | FetchError::SnapshotWriteIo(..)
                | FetchError::SnapshotWritePolars(..)
                | FetchError::TaskJoin(_)
        )
    }
}
