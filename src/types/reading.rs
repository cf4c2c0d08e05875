//! Column layout of a sensor reading table and conversions between the
//! tabular form (Polars `DataFrame`) and per-row records handed to consumers.

use log::warn;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

pub const COL_TIMESTAMP: &str = "Timestamp";
pub const COL_VALUE: &str = "Value";
pub const COL_UNITS: &str = "Units";
pub const COL_SUSPECT: &str = "Flagged as Suspect Reading";
pub const COL_SENSOR_NAME: &str = "Sensor Name";
pub const COL_LATITUDE: &str = "Sensor Centroid Latitude";
pub const COL_LONGITUDE: &str = "Sensor Centroid Longitude";

/// Columns every table coming from the aggregation service must carry.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    COL_TIMESTAMP,
    COL_VALUE,
    COL_UNITS,
    COL_SUSPECT,
    COL_SENSOR_NAME,
    COL_LATITUDE,
    COL_LONGITUDE,
];

/// Textual layout of the `Timestamp` column, both on the wire and in snapshots.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One sensor observation as handed to consumers.
///
/// Field names serialize to the same headers the aggregation service uses, so a
/// `Vec<ReadingRecord>` renders as the familiar "records" JSON shape. Every field
/// except the timestamp is optional: downsampled buckets may carry a mean without
/// the per-sensor side columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Value")]
    pub value: Option<f64>,
    #[serde(rename = "Units")]
    pub units: Option<String>,
    #[serde(rename = "Flagged as Suspect Reading")]
    pub flagged_as_suspect: Option<bool>,
    #[serde(rename = "Sensor Name")]
    pub sensor_name: Option<String>,
    #[serde(rename = "Sensor Centroid Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Sensor Centroid Longitude")]
    pub longitude: Option<f64>,
}

/// Parses a CSV body (header row required) into a reading table.
///
/// `Value` is normalised to `Float64` and a textual `Timestamp` is parsed into a
/// naive millisecond `Datetime`, so frames coming from the remote service, from a
/// snapshot or from a test fixture all share one schema.
pub fn parse_readings(body: &[u8]) -> PolarsResult<DataFrame> {
    let df = csv_read_options()
        .into_reader_with_file_handle(Cursor::new(body.to_vec()))
        .finish()?;
    normalize_readings(df)
}

/// CSV options shared by remote bodies and snapshot files.
pub(crate) fn csv_read_options() -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
}

/// Names of the [`REQUIRED_COLUMNS`] absent from `df`, in declaration order.
pub(crate) fn missing_columns(df: &DataFrame) -> Vec<String> {
    let schema = df.schema();
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| !schema.contains(name))
        .map(|name| name.to_string())
        .collect()
}

/// Brings `Value` and `Timestamp` to their canonical dtypes.
pub(crate) fn normalize_readings(df: DataFrame) -> PolarsResult<DataFrame> {
    let schema = df.schema();
    let mut casts = Vec::new();

    if let Some(dtype) = schema.get(COL_VALUE) {
        if dtype != &DataType::Float64 {
            casts.push(col(COL_VALUE).cast(DataType::Float64));
        }
    }

    match schema.get(COL_TIMESTAMP) {
        Some(DataType::String) => casts.push(col(COL_TIMESTAMP).str().strptime(
            DataType::Datetime(TimeUnit::Milliseconds, None),
            StrptimeOptions {
                format: Some(TIMESTAMP_FORMAT.into()),
                strict: false,
                ..Default::default()
            },
            lit("raise"),
        )),
        Some(DataType::Datetime(TimeUnit::Milliseconds, None)) | None => {}
        Some(_) => casts.push(
            col(COL_TIMESTAMP).cast(DataType::Datetime(TimeUnit::Milliseconds, None)),
        ),
    }

    if casts.is_empty() {
        return Ok(df);
    }
    let nulls_before = timestamp_nulls(&df);
    let normalized = df.lazy().with_columns(casts).collect()?;

    let nulls_after = timestamp_nulls(&normalized);
    if nulls_after > nulls_before {
        warn!(
            "{} of {} timestamps did not match '{}' and were set to null",
            nulls_after - nulls_before,
            normalized.height(),
            TIMESTAMP_FORMAT
        );
    }
    Ok(normalized)
}

fn timestamp_nulls(df: &DataFrame) -> usize {
    df.column(COL_TIMESTAMP).map_or(0, |c| c.null_count())
}

/// Converts a reading table into consumer records, one per row.
///
/// Missing side columns simply produce `None` fields.
pub fn records_from_frame(df: &DataFrame) -> PolarsResult<Vec<ReadingRecord>> {
    let schema = df.schema();
    let mut conversions = Vec::new();
    if schema.contains(COL_TIMESTAMP) {
        conversions.push(col(COL_TIMESTAMP).dt().to_string(TIMESTAMP_FORMAT));
    }
    for name in [COL_VALUE, COL_LATITUDE, COL_LONGITUDE] {
        if schema.contains(name) {
            conversions.push(col(name).cast(DataType::Float64));
        }
    }
    let formatted = df.clone().lazy().with_columns(conversions).collect()?;

    let floats = |name: &str| formatted.column(name).ok().and_then(|c| c.f64().ok());
    let strings = |name: &str| formatted.column(name).ok().and_then(|c| c.str().ok());

    let timestamps = strings(COL_TIMESTAMP);
    let values = floats(COL_VALUE);
    let units = strings(COL_UNITS);
    let suspect = formatted.column(COL_SUSPECT).ok();
    let names = strings(COL_SENSOR_NAME);
    let lats = floats(COL_LATITUDE);
    let lons = floats(COL_LONGITUDE);

    let records = (0..formatted.height())
        .map(|idx| ReadingRecord {
            timestamp: timestamps
                .and_then(|ca| ca.get(idx))
                .map(str::to_string)
                .unwrap_or_default(),
            value: values.and_then(|ca| ca.get(idx)),
            units: units.and_then(|ca| ca.get(idx)).map(str::to_string),
            flagged_as_suspect: suspect.and_then(|c| get_opt_bool(c, idx)),
            sensor_name: names.and_then(|ca| ca.get(idx)).map(str::to_string),
            latitude: lats.and_then(|ca| ca.get(idx)),
            longitude: lons.and_then(|ca| ca.get(idx)),
        })
        .collect();
    Ok(records)
}

fn get_opt_str(column: &Column, idx: usize) -> Option<String> {
    column
        .str()
        .ok()
        .and_then(|ca| ca.get(idx))
        .map(str::to_string)
}

/// Suspect flags arrive either as booleans or as "True"/"False" text.
fn get_opt_bool(column: &Column, idx: usize) -> Option<bool> {
    column
        .bool()
        .ok()
        .and_then(|ca| ca.get(idx))
        .or_else(|| {
            get_opt_str(column, idx).and_then(|s| match s.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            })
        })
}
