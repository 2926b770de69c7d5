/// Unit conversion factors
pub const KELVIN_OFFSET: f64 = 273.15;
pub const KPH_PER_MS: f64 = 3.6;
pub const METERS_PER_KM: f64 = 1000.0;

/// Physically plausible surface temperature range (°C); readings outside
/// this range are rejected rather than clamped
pub const MIN_PLAUSIBLE_TEMP_C: f64 = -90.0;
pub const MAX_PLAUSIBLE_TEMP_C: f64 = 60.0;

/// Percentage bounds for clamped fields
pub const MIN_PCT: i64 = 0;
pub const MAX_PCT: i64 = 100;

/// Wind direction wraps into [0, 360)
pub const FULL_CIRCLE_DEG: f64 = 360.0;

/// Storage defaults
pub const BACKUP_PREFIX: &str = "weather_backup";
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;

/// Provider identifiers carried in `WeatherRecord::source`
pub const SOURCE_OPENWEATHERMAP: &str = "openweathermap";
pub const SOURCE_WEATHERAPI: &str = "weatherapi";
