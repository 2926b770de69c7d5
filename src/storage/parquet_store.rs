use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tempfile::NamedTempFile;

use crate::error::{EtlError, Result, StorageErrorKind};
use crate::models::WeatherRecord;
use crate::storage::StorageBackend;
use crate::utils::constants::DEFAULT_ROW_GROUP_SIZE;

/// Columnar backend: the full record schema with explicit per-column types.
/// Parquet files cannot be appended in place, so `append` reads the current
/// dataset, merges the batch and rewrites through a temp file rename.
pub struct ParquetStore {
    path: PathBuf,
    compression: Compression,
    row_group_size: usize,
}

impl ParquetStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EtlError::from_storage_io(e, path))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        })
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("city", DataType::Utf8, false),
            Field::new("country", DataType::Utf8, false),
            Field::new("latitude", DataType::Float64, false),
            Field::new("longitude", DataType::Float64, false),
            Field::new("timezone", DataType::Utf8, false),
            Field::new("temperature_c", DataType::Float64, false),
            Field::new("feels_like_c", DataType::Float64, false),
            Field::new("temp_min_c", DataType::Float64, false),
            Field::new("temp_max_c", DataType::Float64, false),
            Field::new("humidity_pct", DataType::UInt8, false),
            Field::new("pressure_hpa", DataType::Float64, false),
            Field::new("wind_speed_ms", DataType::Float64, false),
            Field::new("wind_gust_ms", DataType::Float64, false),
            Field::new("wind_direction_deg", DataType::Float64, false),
            Field::new("uv_index", DataType::Float64, false),
            Field::new("visibility_m", DataType::Float64, false),
            Field::new("cloudiness_pct", DataType::UInt8, false),
            Field::new("pm2_5", DataType::Float64, true),
            Field::new("co", DataType::Float64, true),
            Field::new("weather_description", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new(
                "collected_at",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
        ]))
    }

    fn records_to_batch(records: &[WeatherRecord], schema: Arc<Schema>) -> Result<RecordBatch> {
        fn utf8<'a>(it: impl Iterator<Item = &'a str>) -> ArrayRef {
            Arc::new(StringArray::from(it.collect::<Vec<_>>()))
        }
        fn f64s(it: impl Iterator<Item = f64>) -> ArrayRef {
            Arc::new(Float64Array::from(it.collect::<Vec<_>>()))
        }

        let columns: Vec<ArrayRef> = vec![
            utf8(records.iter().map(|r| r.city.as_str())),
            utf8(records.iter().map(|r| r.country.as_str())),
            f64s(records.iter().map(|r| r.latitude)),
            f64s(records.iter().map(|r| r.longitude)),
            utf8(records.iter().map(|r| r.timezone.as_str())),
            f64s(records.iter().map(|r| r.temperature_c)),
            f64s(records.iter().map(|r| r.feels_like_c)),
            f64s(records.iter().map(|r| r.temp_min_c)),
            f64s(records.iter().map(|r| r.temp_max_c)),
            Arc::new(UInt8Array::from(
                records.iter().map(|r| r.humidity_pct).collect::<Vec<_>>(),
            )),
            f64s(records.iter().map(|r| r.pressure_hpa)),
            f64s(records.iter().map(|r| r.wind_speed_ms)),
            f64s(records.iter().map(|r| r.wind_gust_ms)),
            f64s(records.iter().map(|r| r.wind_direction_deg)),
            f64s(records.iter().map(|r| r.uv_index)),
            f64s(records.iter().map(|r| r.visibility_m)),
            Arc::new(UInt8Array::from(
                records.iter().map(|r| r.cloudiness_pct).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(
                records.iter().map(|r| r.pm2_5).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(
                records.iter().map(|r| r.co).collect::<Vec<_>>(),
            )),
            utf8(records.iter().map(|r| r.weather_description.as_str())),
            utf8(records.iter().map(|r| r.source.as_str())),
            Arc::new(TimestampMicrosecondArray::from(
                records
                    .iter()
                    .map(|r| r.collected_at.timestamp_micros())
                    .collect::<Vec<_>>(),
            )),
        ];

        Ok(RecordBatch::try_new(schema, columns)?)
    }

    fn read_records(&self) -> Result<Vec<WeatherRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path).map_err(|e| EtlError::from_storage_io(e, &self.path))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut records = Vec::new();
        for batch in reader {
            let batch = batch?;
            self.batch_to_records(&batch, &mut records)?;
        }
        Ok(records)
    }

    fn batch_to_records(&self, batch: &RecordBatch, out: &mut Vec<WeatherRecord>) -> Result<()> {
        fn col<'a, T: 'static>(batch: &'a RecordBatch, idx: usize, name: &str) -> Result<&'a T> {
            batch
                .column(idx)
                .as_any()
                .downcast_ref::<T>()
                .ok_or_else(|| {
                    EtlError::storage(
                        StorageErrorKind::SchemaMismatch,
                        format!("invalid {name} column type"),
                    )
                })
        }

        let city: &StringArray = col(batch, 0, "city")?;
        let country: &StringArray = col(batch, 1, "country")?;
        let latitude: &Float64Array = col(batch, 2, "latitude")?;
        let longitude: &Float64Array = col(batch, 3, "longitude")?;
        let timezone: &StringArray = col(batch, 4, "timezone")?;
        let temperature: &Float64Array = col(batch, 5, "temperature_c")?;
        let feels_like: &Float64Array = col(batch, 6, "feels_like_c")?;
        let temp_min: &Float64Array = col(batch, 7, "temp_min_c")?;
        let temp_max: &Float64Array = col(batch, 8, "temp_max_c")?;
        let humidity: &UInt8Array = col(batch, 9, "humidity_pct")?;
        let pressure: &Float64Array = col(batch, 10, "pressure_hpa")?;
        let wind_speed: &Float64Array = col(batch, 11, "wind_speed_ms")?;
        let wind_gust: &Float64Array = col(batch, 12, "wind_gust_ms")?;
        let wind_direction: &Float64Array = col(batch, 13, "wind_direction_deg")?;
        let uv_index: &Float64Array = col(batch, 14, "uv_index")?;
        let visibility: &Float64Array = col(batch, 15, "visibility_m")?;
        let cloudiness: &UInt8Array = col(batch, 16, "cloudiness_pct")?;
        let pm2_5: &Float64Array = col(batch, 17, "pm2_5")?;
        let co: &Float64Array = col(batch, 18, "co")?;
        let description: &StringArray = col(batch, 19, "weather_description")?;
        let source: &StringArray = col(batch, 20, "source")?;
        let collected_at: &TimestampMicrosecondArray = col(batch, 21, "collected_at")?;

        for i in 0..batch.num_rows() {
            let stamp = DateTime::<Utc>::from_timestamp_micros(collected_at.value(i))
                .ok_or_else(|| {
                    EtlError::storage(
                        StorageErrorKind::SchemaMismatch,
                        "invalid collected_at timestamp",
                    )
                })?;
            out.push(WeatherRecord {
                city: city.value(i).to_string(),
                country: country.value(i).to_string(),
                latitude: latitude.value(i),
                longitude: longitude.value(i),
                timezone: timezone.value(i).to_string(),
                temperature_c: temperature.value(i),
                feels_like_c: feels_like.value(i),
                temp_min_c: temp_min.value(i),
                temp_max_c: temp_max.value(i),
                humidity_pct: humidity.value(i),
                pressure_hpa: pressure.value(i),
                wind_speed_ms: wind_speed.value(i),
                wind_gust_ms: wind_gust.value(i),
                wind_direction_deg: wind_direction.value(i),
                uv_index: uv_index.value(i),
                visibility_m: visibility.value(i),
                cloudiness_pct: cloudiness.value(i),
                pm2_5: (!pm2_5.is_null(i)).then(|| pm2_5.value(i)),
                co: (!co.is_null(i)).then(|| co.value(i)),
                weather_description: description.value(i).to_string(),
                source: source.value(i).to_string(),
                collected_at: stamp,
            });
        }
        Ok(())
    }

    fn write_all(&self, records: &[WeatherRecord]) -> Result<()> {
        let schema = Self::schema();
        let batch = Self::records_to_batch(records, schema.clone())?;

        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let tmp = NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))
            .map_err(|e| EtlError::from_storage_io(e, &self.path))?;

        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();
        let file = tmp
            .as_file()
            .try_clone()
            .map_err(|e| EtlError::from_storage_io(e, &self.path))?;
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        tmp.persist(&self.path)
            .map_err(|e| EtlError::from_storage_io(e.error, &self.path))?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for ParquetStore {
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
