pub mod backup;
pub mod csv_store;
pub mod json_store;
pub mod parquet_store;
pub mod postgres_store;
pub mod sqlite_store;

pub use backup::BackupManager;
pub use csv_store::CsvStore;
pub use json_store::JsonStore;
pub use parquet_store::ParquetStore;
pub use postgres_store::PostgresStore;
pub use sqlite_store::SqliteStore;

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::WeatherRecord;

/// Backend selection is a pure configuration switch: every variant stores
/// the same record schema and none of them requires changes elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Csv { path: PathBuf },
    Json { path: PathBuf },
    Parquet { path: PathBuf },
    Sqlite { path: PathBuf },
    Postgres { url: String },
}

/// Uniform capability set implemented by every storage backend.
///
/// `append` is strictly additive and atomic per call: file backends gain
/// all-or-nothing visibility through write-then-rename, database backends
/// through a single transaction per batch. No backend deduplicates;
/// appending the same batch twice produces duplicate rows, and callers that
/// want dedup must key on (city, collected_at) themselves.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn append(&self, records: &[WeatherRecord]) -> Result<usize>;

    async fn query_all(&self) -> Result<Vec<WeatherRecord>>;

    /// Most recent record per city, by `collected_at`.
    async fn query_latest(&self) -> Result<HashMap<String, WeatherRecord>> {
        Ok(latest_by_city(self.query_all().await?))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn latest_by_city(records: Vec<WeatherRecord>) -> HashMap<String, WeatherRecord> {
    let mut latest: HashMap<String, WeatherRecord> = HashMap::new();
    for record in records {
        match latest.get(&record.city) {
            Some(existing) if existing.collected_at >= record.collected_at => {}
            _ => {
                latest.insert(record.city.clone(), record);
            }
        }
    }
    latest
}

/// A handle on one configured backend. The write lock serializes `append`
/// calls so at most one batch is in flight per handle, preserving the
/// atomic-batch guarantee; reads go straight to the backend.
pub struct Storage {
    backend: Box<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl Storage {
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let backend: Box<dyn StorageBackend> = match config {
            StorageConfig::Csv { path } => Box::new(CsvStore::open(path)?),
            StorageConfig::Json { path } => Box::new(JsonStore::open(path)?),
            StorageConfig::Parquet { path } => Box::new(ParquetStore::open(path)?),
            StorageConfig::Sqlite { path } => Box::new(SqliteStore::connect(path).await?),
            StorageConfig::Postgres { url } => Box::new(PostgresStore::connect(url).await?),
        };
        Ok(Self {
            backend,
            write_lock: Mutex::new(()),
        })
    }

    pub async fn append(&self, records: &[WeatherRecord]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        self.backend.append(records).await
    }

    pub async fn query_all(&self) -> Result<Vec<WeatherRecord>> {
        self.backend.query_all().await
    }

    pub async fn query_latest(&self) -> Result<HashMap<String, WeatherRecord>> {
        self.backend.query_latest().await
    }

    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}
