use crate::config::ClientConfig;
use crate::sensor_data::error::FetchError;
use crate::sensor_data::outcome::FetchOutcome;
use crate::types::fetch_request::FetchRequest;
use crate::types::reading::{
    csv_read_options, missing_columns, normalize_readings, parse_readings, TIMESTAMP_FORMAT,
};
use chrono::Utc;
use log::{debug, info, warn};
use polars::frame::DataFrame;
use polars::prelude::*;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::{fs, task};

/// Body prefix the service returns while it is down for maintenance.
pub const MAINTENANCE_SENTINEL: &str = "<!doctype html>\n<title>Site Maintenance</title>";

/// Resolves fetch requests against the aggregation service, keeping one CSV
/// snapshot per `(variable, days)` key as the fallback when the service fails.
pub struct SensorDataLoader {
    snapshot_dir: PathBuf,
    config: ClientConfig,
    download_client: Client,
}

impl SensorDataLoader {
    pub fn new(snapshot_dir: &Path, config: ClientConfig) -> SensorDataLoader {
        SensorDataLoader {
            snapshot_dir: snapshot_dir.to_path_buf(),
            config,
            download_client: Client::new(),
        }
    }

    pub fn snapshot_path(&self, request: &FetchRequest) -> PathBuf {
        self.snapshot_dir.join(request.snapshot_file_name())
    }

    /// Reads the request from the service, refreshing its snapshot, and falls
    /// back to the last snapshot when any step of that fails.
    ///
    /// A missing snapshot after a failed read is terminal and never retried.
    pub async fn load(&self, request: &FetchRequest) -> FetchOutcome {
        let snapshot_path = self.snapshot_path(request);

        let cause = match self.fetch_and_snapshot(request, &snapshot_path).await {
            Ok(frame) => return FetchOutcome::Fetched(frame),
            Err(e) => e,
        };
        warn!("Failed to load {} from the remote service: {}", request, cause);

        if fs::metadata(&snapshot_path).await.is_err() {
            warn!(
                "No snapshot for {} at {:?}, data is unavailable",
                request, snapshot_path
            );
            return FetchOutcome::Unavailable(FetchError::DataUnavailable {
                variable: request.variable().to_string(),
                days: request.days(),
                cause: Box::new(cause),
            });
        }

        info!(
            "Loading {} from snapshot {:?} after remote failure",
            request, snapshot_path
        );
        match Self::read_snapshot(&snapshot_path).await {
            Ok(frame) => FetchOutcome::FellBackToCache { frame, cause },
            Err(read_err) => {
                warn!("Snapshot {:?} could not be read: {}", snapshot_path, read_err);
                FetchOutcome::Unavailable(FetchError::DataUnavailable {
                    variable: request.variable().to_string(),
                    days: request.days(),
                    cause: Box::new(read_err),
                })
            }
        }
    }

    async fn fetch_and_snapshot(
        &self,
        request: &FetchRequest,
        snapshot_path: &Path,
    ) -> Result<DataFrame, FetchError> {
        let body = self.download(request).await?;

        let variable = request.variable().to_string();
        let frame = task::spawn_blocking(move || {
            let frame = parse_readings(body.as_bytes()).map_err(|source| FetchError::CsvParse {
                variable: variable.clone(),
                source,
            })?;
            let missing = missing_columns(&frame);
            if !missing.is_empty() {
                return Err(FetchError::UnexpectedSchema { variable, missing });
            }
            Ok(frame)
        })
        .await??;
        debug!("Parsed {} rows for {}", frame.height(), request);

        fs::create_dir_all(&self.snapshot_dir)
            .await
            .map_err(|e| FetchError::SnapshotWriteIo(self.snapshot_dir.clone(), e))?;
        Self::write_snapshot(frame.clone(), snapshot_path).await?;
        info!(
            "Stored snapshot for {} ({} rows) at {:?}",
            request,
            frame.height(),
            snapshot_path
        );
        Ok(frame)
    }

    /// Performs the remote read and returns the raw CSV body.
    async fn download(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let url = self.config.base_url().to_string();
        let params = request.query_params(Utc::now(), &self.config);
        info!("Requesting {} from {}", request, url);

        let response = self
            .download_client
            .get(&url)
            .query(&params)
            .timeout(self.config.request_timeout())
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    FetchError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    FetchError::NetworkRequest(url, e)
                });
            }
        };

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;

        if body.starts_with(MAINTENANCE_SENTINEL) {
            warn!("{} answered with its maintenance page", url);
            return Err(FetchError::Maintenance(url));
        }
        Ok(body)
    }

    /// Replaces the snapshot atomically: the table is written to a temporary file
    /// next to the target and renamed over it.
    async fn write_snapshot(mut df: DataFrame, path: &Path) -> Result<(), FetchError> {
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            let dir = path_buf
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let mut temp_file = NamedTempFile::new_in(&dir)
                .map_err(|e| FetchError::SnapshotWriteIo(path_buf.clone(), e))?;
            CsvWriter::new(temp_file.as_file_mut())
                .include_header(true)
                .with_datetime_format(Some(TIMESTAMP_FORMAT.to_string()))
                .finish(&mut df)
                .map_err(|e| FetchError::SnapshotWritePolars(path_buf.clone(), e))?;
            temp_file
                .persist(&path_buf)
                .map_err(|e| FetchError::SnapshotWriteIo(path_buf.clone(), e.error))?;
            Ok::<(), FetchError>(())
        })
        .await??;
        Ok(())
    }

    pub(crate) async fn read_snapshot(path: &Path) -> Result<DataFrame, FetchError> {
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            csv_read_options()
                .try_into_reader_with_file_path(Some(path_buf.clone()))
                .and_then(|reader| reader.finish())
                .and_then(normalize_readings)
                .map_err(|e| FetchError::SnapshotRead(path_buf, e))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor_data::outcome::DataOrigin;
    use crate::sensor_data::test_server::{serve, serve_silent, unreachable_url};
    use crate::types::reading::fixtures::{csv_from_owned, quarter_hour_rows};
    use crate::types::reading::COL_VALUE;
    use std::time::Duration;
    use tempfile::TempDir;

    fn loader_for(url: &str, dir: &TempDir) -> SensorDataLoader {
        let config = ClientConfig::builder().base_url(url).build();
        SensorDataLoader::new(dir.path(), config)
    }

    fn ten_row_snapshot() -> String {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        csv_from_owned(&quarter_hour_rows(&values))
    }

    #[tokio::test]
    async fn test_successful_fetch_writes_snapshot() -> Result<(), Box<dyn std::error::Error>> {
        let body = csv_from_owned(&quarter_hour_rows(&[4.0, 5.0, 6.0]));
        let server = serve(200, body).await;
        let dir = TempDir::new()?;
        let loader = loader_for(&server.url, &dir);
        let request = FetchRequest::new("PM2.5", 1)?;

        let outcome = loader.load(&request).await;
        assert_eq!(outcome.origin(), Some(DataOrigin::Remote));
        let (frame, _) = outcome.into_result()?;
        assert_eq!(frame.height(), 3);
        assert_eq!(server.hits(), 1);

        let snapshot = SensorDataLoader::read_snapshot(&loader.snapshot_path(&request)).await?;
        assert_eq!(snapshot.height(), 3);
        let values: Vec<Option<f64>> = snapshot.column(COL_VALUE)?.f64()?.into_iter().collect();
        assert_eq!(values, vec![Some(4.0), Some(5.0), Some(6.0)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_maintenance_falls_back_without_overwriting() -> Result<(), Box<dyn std::error::Error>> {
        let server = serve(200, format!("{MAINTENANCE_SENTINEL}\n<h1>Back soon</h1>")).await;
        let dir = TempDir::new()?;
        let loader = loader_for(&server.url, &dir);
        let request = FetchRequest::new("PM2.5", 1)?;

        let snapshot_path = loader.snapshot_path(&request);
        let original = ten_row_snapshot();
        std::fs::write(&snapshot_path, &original)?;

        match loader.load(&request).await {
            FetchOutcome::FellBackToCache { frame, cause } => {
                assert_eq!(frame.height(), 10);
                assert!(matches!(cause, FetchError::Maintenance(_)));
            }
            other => panic!("expected a snapshot fallback, got {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(&snapshot_path)?, original);
        Ok(())
    }

    #[tokio::test]
    async fn test_maintenance_without_snapshot_is_unavailable() -> Result<(), Box<dyn std::error::Error>> {
        let server = serve(200, MAINTENANCE_SENTINEL.to_string()).await;
        let dir = TempDir::new()?;
        let loader = loader_for(&server.url, &dir);
        let request = FetchRequest::new("NO2", 7)?;

        match loader.load(&request).await {
            FetchOutcome::Unavailable(FetchError::DataUnavailable { variable, days, cause }) => {
                assert_eq!(variable, "NO2");
                assert_eq!(days, 7);
                assert!(cause.is_transient());
            }
            other => panic!("expected data to be unavailable, got {:?}", other),
        }
        assert!(!loader.snapshot_path(&request).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_network_error_falls_back() -> Result<(), Box<dyn std::error::Error>> {
        let url = unreachable_url().await;
        let dir = TempDir::new()?;
        let loader = loader_for(&url, &dir);
        let request = FetchRequest::new("O3", 3)?;
        std::fs::write(loader.snapshot_path(&request), ten_row_snapshot())?;

        match loader.load(&request).await {
            FetchOutcome::FellBackToCache { frame, cause } => {
                assert_eq!(frame.height(), 10);
                assert!(matches!(cause, FetchError::NetworkRequest(..)));
            }
            other => panic!("expected a snapshot fallback, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_http_error_status_falls_back() -> Result<(), Box<dyn std::error::Error>> {
        let server = serve(503, "unavailable".to_string()).await;
        let dir = TempDir::new()?;
        let loader = loader_for(&server.url, &dir);
        let request = FetchRequest::new("PM10", 1)?;
        std::fs::write(loader.snapshot_path(&request), ten_row_snapshot())?;

        match loader.load(&request).await {
            FetchOutcome::FellBackToCache { cause, .. } => match cause {
                FetchError::HttpStatus { status, .. } => assert_eq!(status.as_u16(), 503),
                other => panic!("unexpected cause {:?}", other),
            },
            other => panic!("expected a snapshot fallback, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_body_without_reading_columns_falls_back() -> Result<(), Box<dyn std::error::Error>> {
        let server = serve(200, "<html><body>Bad Gateway</body></html>".to_string()).await;
        let dir = TempDir::new()?;
        let loader = loader_for(&server.url, &dir);
        let request = FetchRequest::new("PM2.5", 1)?;

        let snapshot_path = loader.snapshot_path(&request);
        let original = ten_row_snapshot();
        std::fs::write(&snapshot_path, &original)?;

        match loader.load(&request).await {
            FetchOutcome::FellBackToCache { frame, cause } => {
                assert_eq!(frame.height(), 10);
                match cause {
                    FetchError::UnexpectedSchema { missing, .. } => {
                        assert!(missing.iter().any(|c| c == "Value"))
                    }
                    other => panic!("unexpected cause {:?}", other),
                }
            }
            other => panic!("expected a snapshot fallback, got {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(&snapshot_path)?, original);
        Ok(())
    }

    #[tokio::test]
    async fn test_request_timeout_falls_back() -> Result<(), Box<dyn std::error::Error>> {
        let server = serve_silent().await;
        let dir = TempDir::new()?;
        let config = ClientConfig::builder()
            .base_url(server.url.clone())
            .request_timeout(Duration::from_millis(200))
            .build();
        let loader = SensorDataLoader::new(dir.path(), config);
        let request = FetchRequest::new("NO2", 3)?;
        std::fs::write(loader.snapshot_path(&request), ten_row_snapshot())?;

        match loader.load(&request).await {
            FetchOutcome::FellBackToCache { frame, cause } => {
                assert_eq!(frame.height(), 10);
                match cause {
                    FetchError::NetworkRequest(_, e) => assert!(e.is_timeout()),
                    other => panic!("unexpected cause {:?}", other),
                }
            }
            other => panic!("expected a snapshot fallback, got {:?}", other),
        }
        assert_eq!(server.hits(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_table_is_a_success_and_replaces_snapshot() -> Result<(), Box<dyn std::error::Error>> {
        let server = serve(200, csv_from_owned(&[])).await;
        let dir = TempDir::new()?;
        let loader = loader_for(&server.url, &dir);
        let request = FetchRequest::new("Humidity", 1)?;
        std::fs::write(loader.snapshot_path(&request), ten_row_snapshot())?;

        let outcome = loader.load(&request).await;
        assert_eq!(outcome.origin(), Some(DataOrigin::Remote));
        let (frame, _) = outcome.into_result()?;
        assert_eq!(frame.height(), 0);

        let snapshot = SensorDataLoader::read_snapshot(&loader.snapshot_path(&request)).await?;
        assert_eq!(snapshot.height(), 0);
        Ok(())
    }
}
