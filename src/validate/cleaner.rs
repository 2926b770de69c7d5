use tracing::warn;

use crate::models::{Observation, WeatherRecord};
use crate::utils::constants::{
    FULL_CIRCLE_DEG, MAX_PCT, MAX_PLAUSIBLE_TEMP_C, MIN_PCT, MIN_PLAUSIBLE_TEMP_C,
};

/// A record removed from the batch, with the originating city and the reason.
/// Rejections never abort processing of other cities in the same batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub city: String,
    pub reason: String,
}

/// One corrective action taken by the cleaner; surfaced so callers can track
/// data quality over time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampEvent {
    pub field: &'static str,
    pub original: f64,
    pub clamped: f64,
}

/// A record that passed validation, together with the clamps applied to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    pub record: WeatherRecord,
    pub clamps: Vec<ClampEvent>,
}

/// Validate and clean one observation.
///
/// Per-field policy:
/// - clamp: humidity and cloudiness into [0,100], wind direction into
///   [0,360) via modulo, negative gauges (wind, visibility, UV, air quality)
///   to zero. Clamps are logged as data-quality events but do not fail the
///   record.
/// - reject: temperature outside the physically plausible range, missing or
///   non-numeric humidity/cloudiness (correction impossible), missing or
///   non-positive pressure, empty city.
///
/// The outcome is deterministic: identical input always produces identical
/// clamped values and the same verdict.
pub fn clean(obs: Observation) -> Result<CleanedRecord, Rejection> {
    let reject = |reason: String| Rejection {
        city: obs.city.clone(),
        reason,
    };

    if obs.city.trim().is_empty() {
        return Err(reject("city is empty".to_string()));
    }

    if !(MIN_PLAUSIBLE_TEMP_C..=MAX_PLAUSIBLE_TEMP_C).contains(&obs.temperature_c) {
        return Err(reject(format!(
            "temperature {:.1}°C outside plausible range [{}, {}]",
            obs.temperature_c, MIN_PLAUSIBLE_TEMP_C, MAX_PLAUSIBLE_TEMP_C
        )));
    }

    let humidity_raw = match obs.humidity_pct {
        Some(h) => h,
        None => return Err(reject("humidity missing or non-numeric".to_string())),
    };
    let cloudiness_raw = match obs.cloudiness_pct {
        Some(c) => c,
        None => return Err(reject("cloudiness missing or non-numeric".to_string())),
    };
    let pressure_hpa = match obs.pressure_hpa {
        Some(p) if p > 0.0 => p,
        Some(p) => return Err(reject(format!("pressure {p} hPa is not positive"))),
        None => return Err(reject("pressure missing or non-numeric".to_string())),
    };

    let mut clamps = Vec::new();
    let mut clamp_pct = |field: &'static str, raw: i64| -> u8 {
        let clamped = raw.clamp(MIN_PCT, MAX_PCT);
        if clamped != raw {
            clamps.push(ClampEvent {
                field,
                original: raw as f64,
                clamped: clamped as f64,
            });
        }
        clamped as u8
    };
    let humidity_pct = clamp_pct("humidity_pct", humidity_raw);
    let cloudiness_pct = clamp_pct("cloudiness_pct", cloudiness_raw);

    let mut clamp_floor = |field: &'static str, raw: f64| -> f64 {
        if raw < 0.0 {
            clamps.push(ClampEvent {
                field,
                original: raw,
                clamped: 0.0,
            });
            0.0
        } else {
            raw
        }
    };
    let wind_speed_ms = clamp_floor("wind_speed_ms", obs.wind_speed_ms);
    let wind_gust_ms = clamp_floor("wind_gust_ms", obs.wind_gust_ms);
    let uv_index = clamp_floor("uv_index", obs.uv_index);
    let visibility_m = clamp_floor("visibility_m", obs.visibility_m);
    let pm2_5 = obs.pm2_5.map(|v| clamp_floor("pm2_5", v));
    let co = obs.co.map(|v| clamp_floor("co", v));

    let wind_direction_deg = obs.wind_direction_deg.rem_euclid(FULL_CIRCLE_DEG);
    if wind_direction_deg != obs.wind_direction_deg {
        clamps.push(ClampEvent {
            field: "wind_direction_deg",
            original: obs.wind_direction_deg,
            clamped: wind_direction_deg,
        });
    }

    for clamp in &clamps {
        warn!(
            city = %obs.city,
            field = clamp.field,
            original = clamp.original,
            clamped = clamp.clamped,
            "clamped out-of-range value"
        );
    }

    Ok(CleanedRecord {
        record: WeatherRecord {
            city: obs.city,
            country: obs.country,
            latitude: obs.latitude,
            longitude: obs.longitude,
            timezone: obs.timezone,
            temperature_c: obs.temperature_c,
            feels_like_c: obs.feels_like_c,
            temp_min_c: obs.temp_min_c,
            temp_max_c: obs.temp_max_c,
            humidity_pct,
            pressure_hpa,
            wind_speed_ms,
            wind_gust_ms,
            wind_direction_deg,
            uv_index,
            visibility_m,
            cloudiness_pct,
            pm2_5,
            co,
            weather_description: obs.weather_description,
            source: obs.source,
            collected_at: obs.collected_at,
        },
        clamps,
    })
}
