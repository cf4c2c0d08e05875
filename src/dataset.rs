//! A fetched reading table for one `(variable, days)` key, and the per-consumer
//! views through which it is cleaned and downsampled.

use crate::cleaning::{self, CleanError};
use crate::sensor_data::outcome::DataOrigin;
use crate::types::fetch_request::FetchRequest;
use crate::types::frequency::TargetFrequency;
use crate::types::reading::{COL_LATITUDE, COL_LONGITUDE, COL_TIMESTAMP, COL_UNITS, COL_VALUE};
use log::{info, warn};
use polars::prelude::*;
use std::fmt;

/// One fetched reading table.
///
/// The raw table and its units never change after construction. Consumers that
/// want to clean or downsample call [`Dataset::view`] and work on their own
/// [`SeriesView`], so a `Dataset` can be shared freely (it is handed out as an
/// `Arc` by the registry).
#[derive(Debug)]
pub struct Dataset {
    request: FetchRequest,
    raw: DataFrame,
    units: String,
    origin: DataOrigin,
}

impl Dataset {
    pub fn new(request: FetchRequest, raw: DataFrame, origin: DataOrigin) -> Self {
        let units = units_of(&raw, &request);
        Self {
            request,
            raw,
            units,
            origin,
        }
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    pub fn variable(&self) -> &str {
        self.request.variable()
    }

    pub fn days(&self) -> u32 {
        self.request.days()
    }

    /// The table exactly as fetched or loaded from the snapshot.
    pub fn raw(&self) -> &DataFrame {
        &self.raw
    }

    /// Units of the first reading, or an empty string when the table carries none.
    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    /// A working copy of the raw table, in the `Raw` state.
    pub fn view(&self) -> SeriesView {
        SeriesView {
            days: self.days(),
            frame: self.raw.clone(),
            state: SeriesState::Raw,
        }
    }

    /// Mean of the raw `Value` column; `None` for an empty table.
    pub fn mean_value(&self) -> Result<Option<f64>, CleanError> {
        let values = self
            .raw
            .column(COL_VALUE)
            .map_err(|_| CleanError::MissingColumn(COL_VALUE.to_string()))?
            .cast(&DataType::Float64)?;
        Ok(values.f64()?.mean())
    }

    /// Highest valid reading per sensor location, sorted by latitude then longitude.
    pub fn peak_by_location(&self) -> Result<DataFrame, CleanError> {
        for column in [COL_LATITUDE, COL_LONGITUDE] {
            if !self.raw.schema().contains(column) {
                return Err(CleanError::MissingColumn(column.to_string()));
            }
        }
        let peaks = cleaning::remove_suspect(&self.raw)?
            .lazy()
            .group_by([col(COL_LATITUDE), col(COL_LONGITUDE)])
            .agg([col(COL_VALUE).max()])
            .sort([COL_LATITUDE, COL_LONGITUDE], Default::default())
            .collect()?;
        Ok(peaks)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.variable())
    }
}

fn units_of(raw: &DataFrame, request: &FetchRequest) -> String {
    let Ok(column) = raw.column(COL_UNITS) else {
        warn!("Units column not found for {}, using empty units", request);
        return String::new();
    };
    match column.str().ok().and_then(|ca| ca.get(0)) {
        Some(units) => units.to_string(),
        None => {
            warn!("Units column is empty for {}, using empty units", request);
            String::new()
        }
    }
}

/// Processing state of a [`SeriesView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesState {
    Raw,
    /// Terminal: the table holds bucket means at this width.
    Downsampled(TargetFrequency),
}

/// What a call to [`SeriesView::downsample`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownsampleStatus {
    Resampled(TargetFrequency),
    /// The view was already downsampled; the table was left untouched.
    AlreadyDownsampled(TargetFrequency),
}

/// A consumer's private working table derived from a [`Dataset`].
#[derive(Debug, Clone)]
pub struct SeriesView {
    days: u32,
    frame: DataFrame,
    state: SeriesState,
}

impl SeriesView {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn state(&self) -> SeriesState {
        self.state
    }

    pub fn is_downsampled(&self) -> bool {
        matches!(self.state, SeriesState::Downsampled(_))
    }

    /// Bucket width used, once the view has been downsampled.
    pub fn target_frequency(&self) -> Option<TargetFrequency> {
        match self.state {
            SeriesState::Raw => None,
            SeriesState::Downsampled(freq) => Some(freq),
        }
    }

    pub fn remove_suspect(&mut self) -> Result<&mut Self, CleanError> {
        self.frame = cleaning::remove_suspect(&self.frame)?;
        Ok(self)
    }

    pub fn remove_outliers(&mut self) -> Result<&mut Self, CleanError> {
        self.frame = cleaning::remove_outliers(&self.frame)?;
        Ok(self)
    }

    /// Replaces the table by per-bucket means of `Value`, with the bucket width
    /// picked from the requested span. Runs at most once per view.
    pub fn downsample(&mut self) -> Result<DownsampleStatus, CleanError> {
        if let SeriesState::Downsampled(freq) = self.state {
            info!("Data is already downsampled to {} resolution", freq);
            return Ok(DownsampleStatus::AlreadyDownsampled(freq));
        }

        let freq = TargetFrequency::for_days(self.days);
        self.frame = resample_mean(&self.frame, freq)?;
        self.state = SeriesState::Downsampled(freq);
        info!("Data has been downsampled to {} resolution", freq);
        Ok(DownsampleStatus::Resampled(freq))
    }
}

/// Buckets readings by `freq` (aligned to the epoch) and averages `Value`.
///
/// The remaining columns are joined back on the bucket start. When several
/// readings share that exact timestamp the first one in arrival order supplies
/// them; buckets whose start has no reading get nulls.
fn resample_mean(df: &DataFrame, freq: TargetFrequency) -> Result<DataFrame, CleanError> {
    for column in [COL_TIMESTAMP, COL_VALUE] {
        if !df.schema().contains(column) {
            return Err(CleanError::MissingColumn(column.to_string()));
        }
    }

    let timestamp = col(COL_TIMESTAMP).cast(DataType::Datetime(TimeUnit::Milliseconds, None));
    let indexed = df.clone().lazy().with_column(timestamp);

    let means = indexed
        .clone()
        .group_by([col(COL_TIMESTAMP)
            .dt()
            .truncate(lit(freq.polars_every()))
            .alias(COL_TIMESTAMP)])
        .agg([col(COL_VALUE).cast(DataType::Float64).mean().alias(COL_VALUE)]);

    let side_columns: Vec<Expr> = df
        .schema()
        .iter_names()
        .filter(|name| name.as_str() != COL_TIMESTAMP && name.as_str() != COL_VALUE)
        .map(|name| col(name.as_str()).first())
        .collect();

    let resampled = if side_columns.is_empty() {
        means
    } else {
        let side = indexed
            .group_by_stable([col(COL_TIMESTAMP)])
            .agg(side_columns);
        means.join(
            side,
            [col(COL_TIMESTAMP)],
            [col(COL_TIMESTAMP)],
            JoinArgs::new(JoinType::Left),
        )
    };

    Ok(resampled
        .sort([COL_TIMESTAMP], Default::default())
        .collect()?)
}
