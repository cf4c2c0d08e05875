//! Acquisition, caching, cleaning and downsampling of environmental sensor
//! time series from the Newcastle Urban Observatory aggregation API.

pub mod api;
mod cleaning;
mod config;
mod dataset;
mod error;
mod forecast;
mod sensor_data;
mod types;
mod urban_observatory;
mod utils;

pub use error::UrbanObsError;
pub use urban_observatory::*;

pub use cleaning::{iqr_fence, remove_outliers, remove_suspect, CleanError, IqrFence, SensorFrameCleanExt};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use dataset::{Dataset, DownsampleStatus, SeriesState, SeriesView};
pub use forecast::{ForecastPoint, ForecastReport, Forecaster};

pub use sensor_data::data_loader::{SensorDataLoader, MAINTENANCE_SENTINEL};
pub use sensor_data::error::FetchError;
pub use sensor_data::outcome::{DataOrigin, FetchOutcome};
pub use sensor_data::registry::DatasetRegistry;

pub use types::fetch_request::FetchRequest;
pub use types::frequency::TargetFrequency;
pub use types::reading::*;
