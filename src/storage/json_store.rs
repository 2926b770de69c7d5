use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::{EtlError, Result, StorageErrorKind};
use crate::models::WeatherRecord;
use crate::storage::StorageBackend;

/// Document backend: the dataset is a single JSON array with one object per
/// record, field names identical to the canonical schema. Same atomic
/// rewrite discipline as the CSV store.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EtlError::from_storage_io(e, path))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn read_records(&self) -> Result<Vec<WeatherRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path).map_err(|e| EtlError::from_storage_io(e, &self.path))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            EtlError::storage(
                StorageErrorKind::SchemaMismatch,
                format!("{}: {}", self.path.display(), e),
            )
        })
    }

    fn write_all(&self, records: &[WeatherRecord]) -> Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let tmp = NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))
            .map_err(|e| EtlError::from_storage_io(e, &self.path))?;
        serde_json::to_writer_pretty(tmp.as_file(), records)?;
        tmp.persist(&self.path)
            .map_err(|e| EtlError::from_storage_io(e.error, &self.path))?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for JsonStore {
    async fn append(&self, records: &[WeatherRecord]) -> Result<usize> {
        let mut all = self.read_records()?;
        all.extend_from_slice(records);
        self.write_all(&all)?;
        Ok(records.len())
    }

    async fn query_all(&self) -> Result<Vec<WeatherRecord>> {
        self.read_records()
    }
}
