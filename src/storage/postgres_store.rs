use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::error::{EtlError, Result, StorageErrorKind};
use crate::models::WeatherRecord;
use crate::storage::StorageBackend;

// Same column set as the SQLite backend; city + collected_at remain an
// unenforced natural key.
const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS weather_records (
    city TEXT NOT NULL,
    country TEXT NOT NULL,
    latitude DOUBLE PRECISION NOT NULL,
    longitude DOUBLE PRECISION NOT NULL,
    timezone TEXT NOT NULL,
    temperature_c DOUBLE PRECISION NOT NULL,
    feels_like_c DOUBLE PRECISION NOT NULL,
    temp_min_c DOUBLE PRECISION NOT NULL,
    temp_max_c DOUBLE PRECISION NOT NULL,
    humidity_pct BIGINT NOT NULL,
    pressure_hpa DOUBLE PRECISION NOT NULL,
    wind_speed_ms DOUBLE PRECISION NOT NULL,
    wind_gust_ms DOUBLE PRECISION NOT NULL,
    wind_direction_deg DOUBLE PRECISION NOT NULL,
    uv_index DOUBLE PRECISION NOT NULL,
    visibility_m DOUBLE PRECISION NOT NULL,
    cloudiness_pct BIGINT NOT NULL,
    pm2_5 DOUBLE PRECISION,
    co DOUBLE PRECISION,
    weather_description TEXT NOT NULL,
    source TEXT NOT NULL,
    collected_at TIMESTAMPTZ NOT NULL
)";

const INSERT: &str = "\
INSERT INTO weather_records (
    city, country, latitude, longitude, timezone,
    temperature_c, feels_like_c, temp_min_c, temp_max_c,
    humidity_pct, pressure_hpa, wind_speed_ms, wind_gust_ms,
    wind_direction_deg, uv_index, visibility_m, cloudiness_pct,
    pm2_5, co, weather_description, source, collected_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)";

/// Client-server SQL backend. Connection failures surface to the caller and
/// are never retried internally; retry/backoff belongs to the scheduler
/// layer.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| {
                EtlError::storage(
                    StorageErrorKind::Connection,
                    format!("postgres: {e}"),
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
impl StorageBackend for PostgresStore {
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

fn row_to_record(row: &PgRow) -> Result<WeatherRecord> {
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
