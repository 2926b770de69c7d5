use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::{EtlError, Result, StorageErrorKind};
use crate::models::WeatherRecord;
use crate::storage::StorageBackend;

/// Flat-file backend: one row per record with the full field set as header.
/// Appends are read-merge-rewrite through a temp file in the destination
/// directory, so readers only ever observe a complete dataset.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EtlError::from_storage_io(e, path))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn read_records(&self) -> Result<Vec<WeatherRecord>> {
        read_csv_records(&self.path)
    }
}

#[async_trait]
impl StorageBackend for CsvStore {
    async fn append(&self, records: &[WeatherRecord]) -> Result<usize> {
        let mut all = self.read_records()?;
        all.extend_from_slice(records);
        write_csv_atomic(&self.path, &all)?;
        Ok(records.len())
    }

    async fn query_all(&self) -> Result<Vec<WeatherRecord>> {
        self.read_records()
    }
}

pub(crate) fn read_csv_records(path: &Path) -> Result<Vec<WeatherRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| classify_csv_error(e, path))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: WeatherRecord = row.map_err(|e| {
            EtlError::storage(
                StorageErrorKind::SchemaMismatch,
                format!("{}: {}", path.display(), e),
            )
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write the full record set to `path` with all-or-nothing visibility:
/// serialize into a temp file in the same directory, then rename over the
/// destination. Shared with the backup manager.
pub(crate) fn write_csv_atomic(path: &Path, records: &[WeatherRecord]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let tmp = NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))
        .map_err(|e| EtlError::from_storage_io(e, path))?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file());
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    tmp.persist(path)
        .map_err(|e| EtlError::from_storage_io(e.error, path))?;
    Ok(())
}

fn classify_csv_error(err: csv::Error, path: &Path) -> EtlError {
    match err.kind() {
        csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
            EtlError::storage(
                StorageErrorKind::Permission,
                format!("{}: {}", path.display(), err),
            )
        }
        _ => EtlError::Csv(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

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
            co: Some(230.1),
            weather_description: "scattered clouds".to_string(),
            source: "openweathermap".to_string(),
            collected_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_append_then_query_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::open(&dir.path().join("weather.csv")).unwrap();

        let written = store.append(&[record("London")]).await.unwrap();
        assert_eq!(written, 1);

        let all = store.query_all().await.unwrap();
        assert_eq!(all, vec![record("London")]);
    }

    #[tokio::test]
    async fn test_append_is_additive_across_calls() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::open(&dir.path().join("weather.csv")).unwrap();

        store.append(&[record("London")]).await.unwrap();
        store.append(&[record("Tokyo"), record("Paris")]).await.unwrap();

        let all = store.query_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].city, "Paris");
    }

    #[tokio::test]
    async fn test_query_on_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::open(&dir.path().join("weather.csv")).unwrap();
        assert!(store.query_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_garbled_file_reports_schema_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weather.csv");
        fs::write(&path, "city,unexpected\nLondon,1\n").unwrap();

        let store = CsvStore::open(&path).unwrap();
        let err = store.query_all().await.unwrap_err();
        assert!(matches!(
            err,
            EtlError::Storage {
                kind: StorageErrorKind::SchemaMismatch,
                ..
            }
        ));
    }
}
