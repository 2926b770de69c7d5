use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::{EtlError, Result, StorageErrorKind};
use crate::models::WeatherRecord;
use crate::storage::StorageBackend;

// city + collected_at form the natural dedup key but are deliberately not
// enforced: append stays strictly additive.
const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS weather_records (
    city TEXT NOT NULL,
    country TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    timezone TEXT NOT NULL,
    temperature_c REAL NOT NULL,
    feels_like_c REAL NOT NULL,
    temp_min_c REAL NOT NULL,
    temp_max_c REAL NOT NULL,
    humidity_pct INTEGER NOT NULL,
    pressure_hpa REAL NOT NULL,
    wind_speed_ms REAL NOT NULL,
    wind_gust_ms REAL NOT NULL,
    wind_direction_deg REAL NOT NULL,
    uv_index REAL NOT NULL,
    visibility_m REAL NOT NULL,
    cloudiness_pct INTEGER NOT NULL,
    pm2_5 REAL,
    co REAL,
    weather_description TEXT NOT NULL,
    source TEXT NOT NULL,
    collected_at TEXT NOT NULL
)";

const INSERT: &str = "\
INSERT INTO weather_records (
    city, country, latitude, longitude, timezone,
    temperature_c, feels_like_c, temp_min_c, temp_max_c,
    humidity_pct, pressure_hpa, wind_speed_ms, wind_gust_ms,
    wind_direction_deg, uv_index, visibility_m, cloudiness_pct,
    pm2_5, co, weather_description, source, collected_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Embedded-SQL backend. One transaction per `append` batch; the table holds
/// exactly the canonical field set.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EtlError::from_storage_io(e, path))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                EtlError::storage(
                    StorageErrorKind::Connection,
                    format!("sqlite {}: {}", path.display(), e),
                )
            })?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteStore {
    async fn append(&self, records: &[WeatherRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(INSERT)
                .bind(&record.city)
                .bind(&record.country)
                .bind(record.latitude)
                .bind(record.longitude)
                .bind(&record.timezone)
                .bind(record.temperature_c)
                .bind(record.feels_like_c)
                .bind(record.temp_min_c)
                .bind(record.temp_max_c)
                .bind(record.humidity_pct as i64)
                .bind(record.pressure_hpa)
                .bind(record.wind_speed_ms)
                .bind(record.wind_gust_ms)
                .bind(record.wind_direction_deg)
                .bind(record.uv_index)
                .bind(record.visibility_m)
                .bind(record.cloudiness_pct as i64)
                .bind(record.pm2_5)
                .bind(record.co)
                .bind(&record.weather_description)
                .bind(&record.source)
                .bind(record.collected_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    async fn query_all(&self) -> Result<Vec<WeatherRecord>> {
        let rows = sqlx::query("SELECT * FROM weather_records ORDER BY collected_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<WeatherRecord> {
    let pct = |name: &str| -> Result<u8> {
        let raw: i64 = row.try_get(name)?;
        u8::try_from(raw).map_err(|_| {
            EtlError::storage(
                StorageErrorKind::SchemaMismatch,
                format!("column {name} holds out-of-range value {raw}"),
            )
        })
    };

    Ok(WeatherRecord {
        city: row.try_get("city")?,
        country: row.try_get("country")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        timezone: row.try_get("timezone")?,
        temperature_c: row.try_get("temperature_c")?,
        feels_like_c: row.try_get("feels_like_c")?,
        temp_min_c: row.try_get("temp_min_c")?,
        temp_max_c: row.try_get("temp_max_c")?,
        humidity_pct: pct("humidity_pct")?,
        pressure_hpa: row.try_get("pressure_hpa")?,
        wind_speed_ms: row.try_get("wind_speed_ms")?,
        wind_gust_ms: row.try_get("wind_gust_ms")?,
        wind_direction_deg: row.try_get("wind_direction_deg")?,
        uv_index: row.try_get("uv_index")?,
        visibility_m: row.try_get("visibility_m")?,
        cloudiness_pct: pct("cloudiness_pct")?,
        pm2_5: row.try_get("pm2_5")?,
        co: row.try_get("co")?,
        weather_description: row.try_get("weather_description")?,
        source: row.try_get("source")?,
        collected_at: row.try_get::<DateTime<Utc>, _>("collected_at")?,
    })
}
