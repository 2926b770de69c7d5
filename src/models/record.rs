use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A raw observation as produced by the normalizer: field names and units are
/// already canonical, but clampable fields may still be out of range and
/// optional instrumentation may be missing. The cleaner turns this into a
/// [`WeatherRecord`] or rejects it.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub humidity_pct: Option<i64>,
    pub pressure_hpa: Option<f64>,
    pub wind_speed_ms: f64,
    pub wind_gust_ms: f64,
    pub wind_direction_deg: f64,
    pub uv_index: f64,
    pub visibility_m: f64,
    pub cloudiness_pct: Option<i64>,
    pub pm2_5: Option<f64>,
    pub co: Option<f64>,
    pub weather_description: String,
    pub source: String,
    pub collected_at: DateTime<Utc>,
}

/// The canonical, unit-consistent weather observation. Immutable once
/// appended: corrections are new records with a later `collected_at`.
///
/// Every storage backend persists exactly this field set with the same
/// semantic types, so a dataset can move between backends without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct WeatherRecord {
    #[validate(length(min = 1))]
    pub city: String,

    pub country: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    pub timezone: String,

    // Temperatures in Celsius
    #[validate(range(min = -90.0, max = 60.0))]
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,

    #[validate(range(min = 0, max = 100))]
    pub humidity_pct: u8,

    #[validate(range(min = 0.0))]
    pub pressure_hpa: f64,

    // Wind in m/s, direction in degrees
    #[validate(range(min = 0.0))]
    pub wind_speed_ms: f64,
    #[validate(range(min = 0.0))]
    pub wind_gust_ms: f64,
    #[validate(range(min = 0.0, max = 360.0))]
    pub wind_direction_deg: f64,

    #[validate(range(min = 0.0))]
    pub uv_index: f64,

    #[validate(range(min = 0.0))]
    pub visibility_m: f64,

    #[validate(range(min = 0, max = 100))]
    pub cloudiness_pct: u8,

    // Air quality, absent when the provider has no data
    pub pm2_5: Option<f64>,
    pub co: Option<f64>,

    pub weather_description: String,

    /// Provider that produced the raw payload ("openweathermap" or
    /// "weatherapi"), kept so mixed-provider datasets stay auditable.
    pub source: String,

    /// UTC time the record was normalized, not the provider's observation
    /// time. Gives every record pipeline-run provenance.
    pub collected_at: DateTime<Utc>,
}

impl WeatherRecord {
    pub fn temp_range_c(&self) -> f64 {
        self.temp_max_c - self.temp_min_c
    }

    pub fn temp_category(&self) -> &'static str {
        match self.temperature_c {
            t if t < 0.0 => "Freezing",
            t if t < 10.0 => "Cold",
            t if t < 20.0 => "Moderate",
            t if t < 30.0 => "Warm",
            _ => "Hot",
        }
    }

    pub fn humidity_category(&self) -> &'static str {
        match self.humidity_pct {
            h if h <= 30 => "Low",
            h if h <= 60 => "Moderate",
            _ => "High",
        }
    }

    /// Simplified Beaufort bands.
    pub fn wind_category(&self) -> &'static str {
        match self.wind_speed_ms {
            w if w < 1.0 => "Calm",
            w if w < 5.0 => "Light",
            w if w < 10.0 => "Moderate",
            w if w < 20.0 => "Strong",
            _ => "Very Strong",
        }
    }

    pub fn has_air_quality(&self) -> bool {
        self.pm2_5.is_some() || self.co.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> WeatherRecord {
        WeatherRecord {
            city: "London".to_string(),
            country: "GB".to_string(),
            latitude: 51.5074,
            longitude: -0.1278,
            timezone: "Europe/London".to_string(),
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
            pm2_5: Some(8.4),
            co: Some(230.1),
            weather_description: "scattered clouds".to_string(),
            source: "openweathermap".to_string(),
            collected_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_record_passes_range_validation() {
        assert!(sample_record().validate().is_ok());
    }

    #[test]
    fn test_derived_categories() {
        let record = sample_record();
        assert_eq!(record.temp_category(), "Moderate");
        assert_eq!(record.humidity_category(), "High");
        assert_eq!(record.wind_category(), "Light");
        assert!((record.temp_range_c() - 4.5).abs() < 1e-9);
        assert!(record.has_air_quality());
    }

    #[test]
    fn test_freezing_and_calm_bands() {
        let mut record = sample_record();
        record.temperature_c = -3.3;
        record.wind_speed_ms = 0.4;
        assert_eq!(record.temp_category(), "Freezing");
        assert_eq!(record.wind_category(), "Calm");
    }

    #[test]
    fn test_serde_round_trip_preserves_fields() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: WeatherRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
