//! Main entry point: a client that resolves sensor variables into cleaned,
//! downsampled reading tables, caching both in memory and on disk.

use crate::config::ClientConfig;
use crate::dataset::{Dataset, SeriesView};
use crate::error::UrbanObsError;
use crate::forecast::{self, ForecastReport, Forecaster};
use crate::sensor_data::data_loader::SensorDataLoader;
use crate::sensor_data::registry::DatasetRegistry;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use std::path::PathBuf;
use std::sync::Arc;

/// Span used when a caller asks for "current" values, e.g. for averages.
pub const LATEST_DAYS: u32 = 1;

/// The client struct for accessing Urban Observatory sensor data.
///
/// Every `(variable, days)` pair is fetched at most once per client; later
/// requests reuse the registered [`Dataset`]. Each successful fetch also refreshes
/// an on-disk CSV snapshot that is used when the service is unreachable.
///
/// # Examples
///
/// ```no_run
/// # use urbanobs::{UrbanObservatory, UrbanObsError};
/// # async fn run() -> Result<(), UrbanObsError> {
/// let client = UrbanObservatory::new().await?;
/// let week = client
///     .readings()
///     .variable("PM2.5")
///     .days(7)
///     .call()
///     .await?;
/// println!("{}", week.frame());
/// # Ok(())
/// # }
/// ```
pub struct UrbanObservatory {
    registry: DatasetRegistry,
}

#[bon]
impl UrbanObservatory {
    /// Creates a client that keeps its snapshots in `cache_folder` and talks to
    /// the service described by `config`. The folder is created if needed.
    pub async fn with_config(cache_folder: PathBuf, config: ClientConfig) -> Result<Self, UrbanObsError> {
        ensure_cache_dir_exists(&cache_folder)
            .await
            .map_err(|e| UrbanObsError::CacheDirCreation(cache_folder.clone(), e))?;
        Ok(Self {
            registry: DatasetRegistry::new(SensorDataLoader::new(&cache_folder, config)),
        })
    }

    /// Creates a client with default service settings and a custom snapshot folder.
    pub async fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, UrbanObsError> {
        Self::with_config(cache_folder, ClientConfig::default()).await
    }

    /// Creates a client using the system cache directory
    /// (e.g. `~/.cache/urbanobs_cache` on Linux).
    pub async fn new() -> Result<Self, UrbanObsError> {
        let cache_folder = get_cache_dir().map_err(UrbanObsError::CacheDirResolution)?;
        Self::with_cache_folder(cache_folder).await
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    /// The shared dataset for `(variable, days)`, fetching it on first use.
    pub async fn dataset(&self, variable: &str, days: u32) -> Result<Arc<Dataset>, UrbanObsError> {
        Ok(self.registry.get_or_create(variable, days).await?)
    }

    /// Fetches a variable and runs the full cleaning pipeline on a private view:
    /// suspect removal, optional IQR outlier removal, then downsampling.
    ///
    /// # Arguments
    ///
    /// * `.variable(&str)`: **Required.** Sensor variable, e.g. `"PM2.5"` or `"NO2"`.
    /// * `.days(u32)`: Optional. Span in days, defaults to `1`.
    /// * `.remove_outliers(bool)`: Optional. Defaults to `true`.
    #[builder]
    pub async fn readings(
        &self,
        variable: &str,
        days: Option<u32>,
        remove_outliers: Option<bool>,
    ) -> Result<SeriesView, UrbanObsError> {
        let days = days.unwrap_or(LATEST_DAYS);
        let dataset = self.dataset(variable, days).await?;

        let mut view = dataset.view();
        view.remove_suspect()?;
        if remove_outliers.unwrap_or(true) {
            view.remove_outliers()?;
        }
        view.downsample()?;
        Ok(view)
    }

    /// Mean of the most recent day's raw values for `variable`.
    pub async fn latest_mean(&self, variable: &str) -> Result<Option<f64>, UrbanObsError> {
        let dataset = self.dataset(variable, LATEST_DAYS).await?;
        Ok(dataset.mean_value()?)
    }

    /// Cleans `variable` over `days`, hands the series to `forecaster` and scores it.
    pub async fn forecast<F: Forecaster>(
        &self,
        variable: &str,
        days: u32,
        forecaster: &F,
    ) -> Result<ForecastReport, UrbanObsError> {
        let dataset = self.dataset(variable, days).await?;
        let series = forecast::prepare_series(dataset.raw())?;
        forecast::evaluate(variable, &series, forecaster)
    }
}
