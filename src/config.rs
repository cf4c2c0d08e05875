//! Settings for talking to the Urban Observatory aggregation endpoint.

use bon::Builder;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://uoweb3.ncl.ac.uk/api/v1.1/sensors/data/agg/csv/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote endpoint and aggregation settings used for every fetch.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use urbanobs::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:8080/agg/csv/")
///     .request_timeout(Duration::from_secs(5))
///     .build();
/// assert_eq!(config.agg_method(), "median");
/// assert_eq!(config.request_timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Aggregation CSV endpoint.
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    base_url: String,
    /// Upper bound on a single remote read. Expiry counts as a source failure
    /// and takes the snapshot fallback path.
    #[builder(default = DEFAULT_TIMEOUT)]
    request_timeout: Duration,
    #[builder(into, default = "median".to_string())]
    agg_method: String,
    #[builder(into, default = "15mins".to_string())]
    agg_period: String,
}

impl ClientConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn agg_method(&self) -> &str {
        &self.agg_method
    }

    pub fn agg_period(&self) -> &str {
        &self.agg_period
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
