use crate::dataset::Dataset;
use crate::sensor_data::data_loader::SensorDataLoader;
use crate::sensor_data::error::FetchError;
use crate::types::fetch_request::FetchRequest;
use log::debug;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-wide collection of fetched datasets, so repeated requests for the
/// same `(variable, days)` reuse one table instead of hitting the service again.
///
/// Entries are never evicted. Requests for a key that is still being fetched are
/// not coalesced: each one performs its own fetch, and whichever finishes first
/// is kept.
pub struct DatasetRegistry {
    loader: SensorDataLoader,
    datasets: Mutex<Vec<Arc<Dataset>>>,
}

impl DatasetRegistry {
    pub fn new(loader: SensorDataLoader) -> Self {
        Self {
            loader,
            datasets: Mutex::new(Vec::new()),
        }
    }

    pub fn loader(&self) -> &SensorDataLoader {
        &self.loader
    }

    /// Returns the registered dataset for `(variable, days)`, fetching and
    /// registering it first if there is none.
    pub async fn get_or_create(&self, variable: &str, days: u32) -> Result<Arc<Dataset>, FetchError> {
        let request = FetchRequest::new(variable, days)?;

        if let Some(existing) = self.find(&request).await {
            debug!("Reusing registered dataset for {}", request);
            return Ok(existing);
        }

        // Fetch outside the lock, the remote read can take a while.
        let (frame, origin) = self.loader.load(&request).await.into_result()?;
        let created = Arc::new(Dataset::new(request.clone(), frame, origin));

        let mut datasets = self.datasets.lock().await;
        if let Some(existing) = datasets.iter().find(|ds| ds.request() == &request) {
            return Ok(Arc::clone(existing));
        }
        datasets.push(Arc::clone(&created));
        Ok(created)
    }

    async fn find(&self, request: &FetchRequest) -> Option<Arc<Dataset>> {
        let datasets = self.datasets.lock().await;
        datasets
            .iter()
            .find(|ds| ds.request() == request)
            .map(Arc::clone)
    }

    pub async fn len(&self) -> usize {
        self.datasets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.datasets.lock().await.is_empty()
    }
}
