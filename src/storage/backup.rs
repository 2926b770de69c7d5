use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::error::{EtlError, Result};
use crate::storage::csv_store::write_csv_atomic;
use crate::storage::Storage;
use crate::utils::constants::BACKUP_PREFIX;

/// Snapshots the dataset to a timestamped CSV copy before destructive
/// operations. A backup reads only committed data through `query_all`, so it
/// can never observe a partially written batch, and it never blocks an
/// in-flight append.
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    /// Write a full, independent copy of the dataset and return its path.
    /// Naming is deterministic by UTC timestamp to second precision.
    pub async fn create_backup(&self, storage: &Storage) -> Result<PathBuf> {
        let records = storage.query_all().await?;

        fs::create_dir_all(&self.backup_dir)
            .map_err(|e| EtlError::from_storage_io(e, &self.backup_dir))?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = self.backup_dir.join(format!("{BACKUP_PREFIX}_{stamp}.csv"));
        write_csv_atomic(&path, &records)?;

        info!(
            backup = %path.display(),
            records = records.len(),
            "created dataset backup"
        );
        Ok(path)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;
    use chrono::TimeZone;
    use tempfile::TempDir;

    use crate::models::WeatherRecord;

    fn record(city: &str) -> WeatherRecord {
        WeatherRecord {
            city: city.to_string(),
            country: "GB".to_string(),
            latitude: 51.5074,
            longitude: -0.1278,
            timezone: "+01:00".to_string(),
            temperature_c: 16.3,
            feels_like_c: 15.9,
            temp_min_c: 14.0,
            temp_max_c: 18.5,
            humidity_pct: 63,
            pressure_hpa: 1012.0,
            wind_speed_ms: 4.2,
            wind_gust_ms: 7.1,
            wind_direction_deg: 250.0,
            uv_index: 3.0,
            visibility_m: 10000.0,
            cloudiness_pct: 40,
            pm2_5: None,
            co: None,
            weather_description: "scattered clouds".to_string(),
            source: "openweathermap".to_string(),
            collected_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_backup_copies_current_dataset() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(&StorageConfig::Csv {
            path: dir.path().join("weather.csv"),
        })
        .await
        .unwrap();
        storage
            .append(&[record("London"), record("Tokyo")])
            .await
            .unwrap();

        let manager = BackupManager::new(dir.path().join("backups"));
        let backup_path = manager.create_backup(&storage).await.unwrap();

        assert!(backup_path.exists());
        let name = backup_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("weather_backup_"));
        assert!(name.ends_with(".csv"));

        let copied = crate::storage::csv_store::read_csv_records(&backup_path).unwrap();
        assert_eq!(copied.len(), 2);
    }

    #[tokio::test]
    async fn test_backup_of_empty_dataset_is_valid() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(&StorageConfig::Csv {
            path: dir.path().join("weather.csv"),
        })
        .await
        .unwrap();

        let manager = BackupManager::new(dir.path().join("backups"));
        let backup_path = manager.create_backup(&storage).await.unwrap();
        assert!(backup_path.exists());
    }
}
