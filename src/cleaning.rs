//! Row filters that strip invalid, suspect and outlying readings from a table.
//!
//! Both filters are pure: they take a table by reference and return a new one.
//! They compose in either order, although the usual pipeline removes suspect
//! readings first so that the quartiles are computed over valid values only.

use crate::types::reading::{COL_SUSPECT, COL_VALUE};
use polars::prelude::*;
use thiserror::Error;

/// Multiplier applied to the interquartile range to place the outlier fences.
pub const IQR_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("Required column '{0}' not found in reading table")]
    MissingColumn(String),

    #[error("Failed processing reading table: {0}")]
    Polars(#[from] PolarsError),
}

/// Tukey fences derived from the first and third quartile of `Value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFence {
    pub q1: f64,
    pub q3: f64,
}

impl IqrFence {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn lower(&self) -> f64 {
        self.q1 - IQR_MULTIPLIER * self.iqr()
    }

    pub fn upper(&self) -> f64 {
        self.q3 + IQR_MULTIPLIER * self.iqr()
    }

    /// Closed interval: values sitting exactly on a fence are kept.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower() && value <= self.upper()
    }
}

pub trait SensorFrameCleanExt {
    /// Drops rows with any missing field, a non-positive `Value`, or a set
    /// `Flagged as Suspect Reading` flag. All other rows are returned unchanged
    /// and in their original order.
    fn remove_suspect(&self) -> Result<DataFrame, CleanError>;

    /// Keeps the rows whose `Value` lies within `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`,
    /// with the quartiles computed from this table.
    fn remove_outliers(&self) -> Result<DataFrame, CleanError>;
}

impl SensorFrameCleanExt for DataFrame {
    fn remove_suspect(&self) -> Result<DataFrame, CleanError> {
        remove_suspect(self)
    }

    fn remove_outliers(&self) -> Result<DataFrame, CleanError> {
        remove_outliers(self)
    }
}

fn require_column(df: &DataFrame, name: &str) -> Result<(), CleanError> {
    if df.schema().contains(name) {
        Ok(())
    } else {
        Err(CleanError::MissingColumn(name.to_string()))
    }
}

/// Expression that is true for readings flagged as suspect, whether the flag
/// was parsed as a boolean or kept as "True"/"False" text.
fn suspect_flag(dtype: Option<&DataType>) -> Expr {
    match dtype {
        Some(DataType::Boolean) => col(COL_SUSPECT),
        Some(DataType::String) => col(COL_SUSPECT).str().to_lowercase().eq(lit("true")),
        _ => col(COL_SUSPECT).cast(DataType::Boolean),
    }
}

pub fn remove_suspect(df: &DataFrame) -> Result<DataFrame, CleanError> {
    require_column(df, COL_VALUE)?;
    require_column(df, COL_SUSPECT)?;

    let schema = df.schema();
    let complete = schema
        .iter_names()
        .map(|name| col(name.as_str()).is_not_null())
        .reduce(|acc, expr| acc.and(expr))
        .unwrap_or_else(|| lit(true));
    let value = col(COL_VALUE).cast(DataType::Float64);
    let flagged = suspect_flag(schema.get(COL_SUSPECT));

    let cleaned = df
        .clone()
        .lazy()
        .filter(
            complete
                .and(value.clone().is_not_nan())
                .and(value.gt(lit(0.0)))
                .and(flagged.not()),
        )
        .collect()?;
    Ok(cleaned)
}

/// Computes the outlier fences for `Value`, using linear interpolation between
/// order statistics. Null and NaN values are skipped. Returns `None` when the
/// table has no usable values.
pub fn iqr_fence(df: &DataFrame) -> Result<Option<IqrFence>, CleanError> {
    require_column(df, COL_VALUE)?;

    let value = col(COL_VALUE).cast(DataType::Float64);
    let finite = value.clone().filter(value.is_not_nan());
    let quartiles = df
        .clone()
        .lazy()
        .select([
            finite
                .clone()
                .quantile(lit(0.25), QuantileMethod::Linear)
                .alias("q1"),
            finite
                .quantile(lit(0.75), QuantileMethod::Linear)
                .alias("q3"),
        ])
        .collect()?;

    let q1 = quartiles.column("q1")?.f64()?.get(0);
    let q3 = quartiles.column("q3")?.f64()?.get(0);
    Ok(q1.zip(q3).map(|(q1, q3)| IqrFence { q1, q3 }))
}

pub fn remove_outliers(df: &DataFrame) -> Result<DataFrame, CleanError> {
    let Some(fence) = iqr_fence(df)? else {
        return Ok(df.clear());
    };

    let value = col(COL_VALUE).cast(DataType::Float64);
    let kept = df
        .clone()
        .lazy()
        .filter(
            value
                .clone()
                .is_not_nan()
                .and(value.clone().gt_eq(lit(fence.lower())))
                .and(value.lt_eq(lit(fence.upper()))),
        )
        .collect()?;
    Ok(kept)
}
