use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{EtlError, Result};
use crate::models::RunSummary;
use crate::normalize::normalize;
use crate::storage::Storage;
use crate::validate::clean;

/// One extractor result per configured city. A failed fetch is an explicit
/// marker, not a fatal pipeline error: the city is skipped and the rest of
/// the batch proceeds.
#[derive(Debug, Clone)]
pub enum CityFetch {
    Fetched { city: String, payload: Value },
    Failed { city: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: RunState,
    pub last_run: Option<DateTime<Utc>>,
    pub message: String,
    pub records_processed: usize,
}

/// Shared pipeline status with explicit transitions
/// (idle → running → success|error → idle), consumed by dashboards and the
/// CLI instead of process-global state. Cloning shares the same state.
#[derive(Clone)]
pub struct PipelineStatus {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatusSnapshot {
                state: RunState::Idle,
                last_run: None,
                message: "pipeline not yet run".to_string(),
                records_processed: 0,
            })),
        }
    }

    /// Move to Running. Fails when a run is already in flight.
    pub fn begin(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state == RunState::Running {
            return Err(EtlError::PipelineBusy);
        }
        inner.state = RunState::Running;
        inner.message = "pipeline is running".to_string();
        Ok(())
    }

    pub fn finish_success(&self, records_processed: usize) {
        let mut inner = self.lock();
        inner.state = RunState::Success;
        inner.last_run = Some(Utc::now());
        inner.records_processed = records_processed;
        inner.message = "pipeline completed".to_string();
    }

    pub fn finish_error(&self, message: impl Into<String>) {
        let mut inner = self.lock();
        inner.state = RunState::Error;
        inner.message = message.into();
    }

    /// Return a terminal state (Success or Error) to Idle. No-op while
    /// Running.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, RunState::Success | RunState::Error) {
            inner.state = RunState::Idle;
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusSnapshot> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The transform-and-load core: normalizes raw payloads, cleans them and
/// appends the surviving records as one batch.
pub struct Pipeline {
    storage: Storage,
    status: PipelineStatus,
}

impl Pipeline {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            status: PipelineStatus::new(),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.clone()
    }

    /// Process one batch of extractor results end to end.
    ///
    /// Per-city failures (fetch markers, normalization errors, validation
    /// rejections) are counted and skipped; they never abort the run. A city
    /// whose record is rejected contributes no data this run and therefore
    /// also counts as failed. Only storage-level failure on the batch append
    /// makes the run itself error, leaving previously committed data intact.
    pub async fn run_once(&self, fetches: Vec<CityFetch>) -> Result<RunSummary> {
        self.status.begin()?;

        let mut summary = RunSummary::default();
        let mut batch = Vec::new();

        for fetch in fetches {
            match fetch {
                CityFetch::Failed { city, reason } => {
                    warn!(%city, %reason, "fetch failed, skipping city");
                    summary.cities_failed += 1;
                }
                CityFetch::Fetched { city, payload } => match normalize(&payload, &city) {
                    Err(source) => {
                        let err = EtlError::Normalize {
                            city: city.clone(),
                            source,
                        };
                        warn!(%err, "skipping city");
                        summary.cities_failed += 1;
                    }
                    Ok(observation) => match clean(observation) {
                        Err(rejection) => {
                            warn!(
                                city = %rejection.city,
                                reason = %rejection.reason,
                                "record rejected"
                            );
                            summary.records_rejected += 1;
                            summary.cities_failed += 1;
                        }
                        Ok(cleaned) => batch.push(cleaned.record),
                    },
                },
            }
        }

        if !batch.is_empty() {
            match self.storage.append(&batch).await {
                Ok(written) => summary.records_written = written,
                Err(err) => {
                    self.status.finish_error(err.to_string());
                    return Err(err);
                }
            }
        }

        self.status.finish_success(summary.records_written);
        info!(%summary, "pipeline run complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn owm_payload(city: &str, temp_c: f64, humidity: i64) -> Value {
        json!({
            "name": city,
            "coord": {"lat": 0.0, "lon": 0.0},
            "main": {
                "temp": temp_c + 273.15,
                "humidity": humidity,
                "pressure": 1010.0
            },
            "clouds": {"all": 20},
            "weather": [{"description": "clear sky"}]
        })
    }

    async fn csv_pipeline(dir: &TempDir) -> Pipeline {
        let storage = Storage::open(&StorageConfig::Csv {
            path: dir.path().join("weather.csv"),
        })
        .await
        .unwrap();
        Pipeline::new(storage)
    }

    #[tokio::test]
    async fn test_run_once_writes_all_valid_cities() {
        let dir = TempDir::new().unwrap();
        let pipeline = csv_pipeline(&dir).await;

        let summary = pipeline
            .run_once(vec![
                CityFetch::Fetched {
                    city: "London".to_string(),
                    payload: owm_payload("London", 16.3, 63),
                },
                CityFetch::Fetched {
                    city: "Tokyo".to_string(),
                    payload: owm_payload("Tokyo", 12.2, 82),
                },
            ])
            .await
            .unwrap();

        assert_eq!(summary.records_written, 2);
        assert_eq!(summary.records_rejected, 0);
        assert_eq!(summary.cities_failed, 0);
        assert_eq!(pipeline.storage().query_all().await.unwrap().len(), 2);
        assert_eq!(pipeline.status().snapshot().state, RunState::Success);
    }

    #[tokio::test]
    async fn test_rejected_city_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        let pipeline = csv_pipeline(&dir).await;

        let summary = pipeline
            .run_once(vec![
                CityFetch::Fetched {
                    city: "Vulcan".to_string(),
                    payload: owm_payload("Vulcan", 150.0, 40),
                },
                CityFetch::Fetched {
                    city: "London".to_string(),
                    payload: owm_payload("London", 16.3, 63),
                },
            ])
            .await
            .unwrap();

        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.records_rejected, 1);
        assert_eq!(summary.cities_failed, 1);

        let stored = pipeline.storage().query_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].city, "London");
    }

    #[tokio::test]
    async fn test_unnormalizable_payload_counts_as_failed_city() {
        let dir = TempDir::new().unwrap();
        let pipeline = csv_pipeline(&dir).await;

        let mut broken = owm_payload("London", 16.3, 63);
        broken["main"].as_object_mut().unwrap().remove("temp");

        let summary = pipeline
            .run_once(vec![
                CityFetch::Fetched {
                    city: "London".to_string(),
                    payload: broken,
                },
                CityFetch::Fetched {
                    city: "Tokyo".to_string(),
                    payload: owm_payload("Tokyo", 12.2, 82),
                },
            ])
            .await
            .unwrap();

        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.records_rejected, 0);
        assert_eq!(summary.cities_failed, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_marker_is_skipped() {
        let dir = TempDir::new().unwrap();
        let pipeline = csv_pipeline(&dir).await;

        let summary = pipeline
            .run_once(vec![
                CityFetch::Failed {
                    city: "Atlantis".to_string(),
                    reason: "timeout".to_string(),
                },
                CityFetch::Fetched {
                    city: "London".to_string(),
                    payload: owm_payload("London", 16.3, 63),
                },
            ])
            .await
            .unwrap();

        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.cities_failed, 1);
    }

    #[tokio::test]
    async fn test_all_cities_failing_still_returns_summary() {
        let dir = TempDir::new().unwrap();
        let pipeline = csv_pipeline(&dir).await;

        let summary = pipeline
            .run_once(vec![CityFetch::Failed {
                city: "Atlantis".to_string(),
                reason: "timeout".to_string(),
            }])
            .await
            .unwrap();

        assert_eq!(summary.records_written, 0);
        assert_eq!(summary.cities_failed, 1);
        assert_eq!(pipeline.status().snapshot().state, RunState::Success);
    }

    #[test]
    fn test_status_rejects_concurrent_begin() {
        let status = PipelineStatus::new();
        status.begin().unwrap();
        assert!(status.begin().is_err());

        status.finish_success(3);
        assert_eq!(status.snapshot().state, RunState::Success);
        assert_eq!(status.snapshot().records_processed, 3);

        status.reset();
        assert_eq!(status.snapshot().state, RunState::Idle);
        assert!(status.begin().is_ok());
    }
}
