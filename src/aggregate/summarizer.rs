use std::collections::HashSet;

use crate::models::{MetricStats, WeatherRecord, WeatherSummary};

/// Compute aggregate statistics over a record set. Pure function, no I/O.
///
/// Each metric's stats cover the values actually present; a metric with zero
/// available values reports as absent rather than zero, and callers must
/// handle that case explicitly.
pub fn summarize(records: &[WeatherRecord]) -> WeatherSummary {
    let mut cities = HashSet::new();
    let mut temperatures = Vec::with_capacity(records.len());
    let mut humidities = Vec::with_capacity(records.len());
    let mut pressures = Vec::with_capacity(records.len());
    let mut wind_speeds = Vec::with_capacity(records.len());

    for record in records {
        cities.insert(record.city.as_str());
        temperatures.push(record.temperature_c);
        humidities.push(record.humidity_pct as f64);
        pressures.push(record.pressure_hpa);
        wind_speeds.push(record.wind_speed_ms);
    }

    WeatherSummary {
        count: records.len(),
        distinct_cities: cities.len(),
        temperature_c: MetricStats::from_values(&temperatures),
        humidity_pct: MetricStats::from_values(&humidities),
        pressure_hpa: MetricStats::from_values(&pressures),
        wind_speed_ms: MetricStats::from_values(&wind_speeds),
    }
}
