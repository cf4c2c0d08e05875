use crate::sensor_data::error::FetchError;
use polars::frame::DataFrame;
use std::fmt;

/// Where a reading table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Freshly read from the aggregation service.
    Remote,
    /// Loaded from the local snapshot after the service failed.
    Snapshot,
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Remote => write!(f, "remote"),
            DataOrigin::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Result of resolving a [`crate::FetchRequest`].
///
/// The fallback path is a variant of its own instead of a side effect of error
/// handling, so callers can tell fresh data from a stale snapshot.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(DataFrame),
    FellBackToCache {
        frame: DataFrame,
        /// The source failure that triggered the fallback.
        cause: FetchError,
    },
    Unavailable(FetchError),
}

impl FetchOutcome {
    pub fn origin(&self) -> Option<DataOrigin> {
        match self {
            FetchOutcome::Fetched(_) => Some(DataOrigin::Remote),
            FetchOutcome::FellBackToCache { .. } => Some(DataOrigin::Snapshot),
            FetchOutcome::Unavailable(_) => None,
        }
    }

    /// Collapses the outcome into the table and its origin, or the terminal error.
    pub fn into_result(self) -> Result<(DataFrame, DataOrigin), FetchError> {
        match self {
            FetchOutcome::Fetched(frame) => Ok((frame, DataOrigin::Remote)),
            FetchOutcome::FellBackToCache { frame, .. } => Ok((frame, DataOrigin::Snapshot)),
            FetchOutcome::Unavailable(err) => Err(err),
        }
    }
}
