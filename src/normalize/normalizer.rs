use chrono::Utc;
use serde_json::Value;

use crate::error::NormalizeError;
use crate::models::Observation;
use crate::utils::constants::{
    KELVIN_OFFSET, KPH_PER_MS, METERS_PER_KM, SOURCE_OPENWEATHERMAP, SOURCE_WEATHERAPI,
};

/// Convert one raw provider payload into a canonical [`Observation`].
///
/// Two provider shapes are recognised: WeatherAPI (RapidAPI) payloads carry
/// `location` and `current` blocks and report Celsius/kph/km; everything
/// else is treated as OpenWeatherMap, whose standard units are Kelvin and
/// m/s. All readings are converted to the canonical units (°C, m/s, metres)
/// here, and `collected_at` is stamped with the current UTC time so every
/// record has pipeline-run provenance, independent of the provider's own
/// observation timestamp.
///
/// Fails when the city cannot be located (payload and `city_hint` both
/// empty) or when no temperature reading is present.
pub fn normalize(payload: &Value, city_hint: &str) -> Result<Observation, NormalizeError> {
    let obj = payload.as_object().ok_or(NormalizeError::NotAnObject)?;

    if obj.contains_key("location") && obj.contains_key("current") {
        normalize_weatherapi(payload, city_hint)
    } else {
        normalize_openweathermap(payload, city_hint)
    }
}

fn normalize_openweathermap(
    payload: &Value,
    city_hint: &str,
) -> Result<Observation, NormalizeError> {
    let city = resolve_city(text(payload, "/name"), city_hint)?;
    let temp_k = required_num(payload, "/main/temp", "main.temp")?;

    // Standard OpenWeatherMap units: temperatures in Kelvin, wind in m/s,
    // visibility in metres, timezone as a UTC offset in seconds.
    let to_celsius = |k: f64| k - KELVIN_OFFSET;
    let temperature_c = to_celsius(temp_k);

    Ok(Observation {
        city,
        country: text(payload, "/sys/country").unwrap_or_default().to_string(),
        latitude: num(payload, "/coord/lat").unwrap_or(0.0),
        longitude: num(payload, "/coord/lon").unwrap_or(0.0),
        timezone: int(payload, "/timezone")
            .map(format_utc_offset)
            .unwrap_or_default(),
        temperature_c,
        feels_like_c: num(payload, "/main/feels_like")
            .map(to_celsius)
            .unwrap_or(temperature_c),
        temp_min_c: num(payload, "/main/temp_min")
            .map(to_celsius)
            .unwrap_or(temperature_c),
        temp_max_c: num(payload, "/main/temp_max")
            .map(to_celsius)
            .unwrap_or(temperature_c),
        humidity_pct: rounded_int(payload, "/main/humidity"),
        pressure_hpa: num(payload, "/main/pressure"),
        wind_speed_ms: num(payload, "/wind/speed").unwrap_or(0.0),
        wind_gust_ms: num(payload, "/wind/gust").unwrap_or(0.0),
        wind_direction_deg: num(payload, "/wind/deg").unwrap_or(0.0),
        uv_index: num(payload, "/uvi").unwrap_or(0.0),
        visibility_m: num(payload, "/visibility").unwrap_or(0.0),
        cloudiness_pct: rounded_int(payload, "/clouds/all"),
        pm2_5: None,
        co: None,
        weather_description: text(payload, "/weather/0/description")
            .unwrap_or_default()
            .to_string(),
        source: SOURCE_OPENWEATHERMAP.to_string(),
        collected_at: Utc::now(),
    })
}

fn normalize_weatherapi(payload: &Value, city_hint: &str) -> Result<Observation, NormalizeError> {
    let city = resolve_city(text(payload, "/location/name"), city_hint)?;
    let temperature_c = required_num(payload, "/current/temp_c", "current.temp_c")?;

    Ok(Observation {
        city,
        country: text(payload, "/location/country")
            .unwrap_or_default()
            .to_string(),
        latitude: num(payload, "/location/lat").unwrap_or(0.0),
        longitude: num(payload, "/location/lon").unwrap_or(0.0),
        timezone: text(payload, "/location/tz_id")
            .unwrap_or_default()
            .to_string(),
        temperature_c,
        feels_like_c: num(payload, "/current/feelslike_c").unwrap_or(temperature_c),
        // The current-conditions endpoint reports a single reading
        temp_min_c: temperature_c,
        temp_max_c: temperature_c,
        humidity_pct: rounded_int(payload, "/current/humidity"),
        pressure_hpa: num(payload, "/current/pressure_mb"),
        wind_speed_ms: num(payload, "/current/wind_kph").unwrap_or(0.0) / KPH_PER_MS,
        wind_gust_ms: num(payload, "/current/gust_kph").unwrap_or(0.0) / KPH_PER_MS,
        wind_direction_deg: num(payload, "/current/wind_degree").unwrap_or(0.0),
        uv_index: num(payload, "/current/uv").unwrap_or(0.0),
        visibility_m: num(payload, "/current/vis_km").unwrap_or(0.0) * METERS_PER_KM,
        cloudiness_pct: rounded_int(payload, "/current/cloud"),
        pm2_5: num(payload, "/current/air_quality/pm2_5"),
        co: num(payload, "/current/air_quality/co"),
        weather_description: text(payload, "/current/condition/text")
            .unwrap_or_default()
            .to_string(),
        source: SOURCE_WEATHERAPI.to_string(),
        collected_at: Utc::now(),
    })
}

fn resolve_city(from_payload: Option<&str>, hint: &str) -> Result<String, NormalizeError> {
    let city = from_payload.unwrap_or("").trim();
    if !city.is_empty() {
        return Ok(city.to_string());
    }
    let hint = hint.trim();
    if !hint.is_empty() {
        return Ok(hint.to_string());
    }
    Err(NormalizeError::MissingField("city"))
}

fn num(payload: &Value, pointer: &str) -> Option<f64> {
    payload.pointer(pointer).and_then(Value::as_f64)
}

fn int(payload: &Value, pointer: &str) -> Option<i64> {
    payload.pointer(pointer).and_then(Value::as_i64)
}

/// Integer-valued reading that some providers emit as a float
/// (`"humidity": 63.0`). Rounded to the nearest whole number; the cleaner
/// handles range afterwards.
fn rounded_int(payload: &Value, pointer: &str) -> Option<i64> {
    payload
        .pointer(pointer)
        .and_then(Value::as_f64)
        .map(|v| v.round() as i64)
}

fn text<'a>(payload: &'a Value, pointer: &str) -> Option<&'a str> {
    payload.pointer(pointer).and_then(Value::as_str)
}

fn required_num(payload: &Value, pointer: &str, field: &'static str) -> Result<f64, NormalizeError> {
    match payload.pointer(pointer) {
        None | Some(Value::Null) => Err(NormalizeError::MissingField(field)),
        Some(value) => value
            .as_f64()
            .ok_or(NormalizeError::NotNumeric { field }),
    }
}

/// Format a UTC offset in seconds as "+HH:MM" / "-HH:MM".
fn format_utc_offset(seconds: i64) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.abs();
    format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owm_payload() -> Value {
        json!({
            "name": "London",
            "coord": {"lat": 51.5074, "lon": -0.1278},
            "sys": {"country": "GB"},
            "timezone": 3600,
            "main": {
                "temp": 289.45,
                "feels_like": 289.05,
                "temp_min": 287.15,
                "temp_max": 291.65,
                "humidity": 63,
                "pressure": 1012.0
            },
            "wind": {"speed": 4.2, "deg": 250, "gust": 7.1},
            "clouds": {"all": 40},
            "visibility": 10000,
            "weather": [{"description": "scattered clouds"}]
        })
    }

    fn weatherapi_payload() -> Value {
        json!({
            "location": {
                "name": "Tokyo",
                "country": "Japan",
                "lat": 35.69,
                "lon": 139.69,
                "tz_id": "Asia/Tokyo"
            },
            "current": {
                "temp_c": 12.2,
                "feelslike_c": 11.0,
                "humidity": 82,
                "pressure_mb": 1018.0,
                "wind_kph": 18.0,
                "gust_kph": 27.0,
                "wind_degree": 130,
                "cloud": 75,
                "vis_km": 8.0,
                "uv": 4.0,
                "condition": {"text": "Light rain"},
                "air_quality": {"co": 230.1, "pm2_5": 8.4}
            }
        })
    }

    #[test]
    fn test_openweathermap_kelvin_conversion() {
        let obs = normalize(&owm_payload(), "").unwrap();
        assert_eq!(obs.city, "London");
        assert_eq!(obs.country, "GB");
        assert!((obs.temperature_c - 16.3).abs() < 1e-9);
        assert!((obs.temp_min_c - 14.0).abs() < 1e-9);
        assert!((obs.temp_max_c - 18.5).abs() < 1e-9);
        assert_eq!(obs.humidity_pct, Some(63));
        assert_eq!(obs.timezone, "+01:00");
        assert_eq!(obs.source, "openweathermap");
        assert_eq!(obs.pm2_5, None);
    }

    #[test]
    fn test_weatherapi_unit_conversion() {
        let obs = normalize(&weatherapi_payload(), "").unwrap();
        assert_eq!(obs.city, "Tokyo");
        assert!((obs.temperature_c - 12.2).abs() < 1e-9);
        assert!((obs.wind_speed_ms - 5.0).abs() < 1e-9);
        assert!((obs.wind_gust_ms - 7.5).abs() < 1e-9);
        assert!((obs.visibility_m - 8000.0).abs() < 1e-9);
        assert_eq!(obs.pm2_5, Some(8.4));
        assert_eq!(obs.co, Some(230.1));
        assert_eq!(obs.source, "weatherapi");
    }

    #[test]
    fn test_missing_temperature_is_an_error() {
        let mut payload = owm_payload();
        payload["main"].as_object_mut().unwrap().remove("temp");
        let err = normalize(&payload, "").unwrap_err();
        assert_eq!(err, NormalizeError::MissingField("main.temp"));
    }

    #[test]
    fn test_city_hint_fills_missing_name() {
        let mut payload = owm_payload();
        payload.as_object_mut().unwrap().remove("name");
        let obs = normalize(&payload, "London").unwrap();
        assert_eq!(obs.city, "London");

        let err = normalize(&payload, "  ").unwrap_err();
        assert_eq!(err, NormalizeError::MissingField("city"));
    }

    #[test]
    fn test_float_typed_percentages_are_rounded_not_dropped() {
        let mut payload = owm_payload();
        payload["main"]["humidity"] = json!(63.0);
        payload["clouds"]["all"] = json!(40.5);
        let obs = normalize(&payload, "").unwrap();
        assert_eq!(obs.humidity_pct, Some(63));
        assert_eq!(obs.cloudiness_pct, Some(41));

        let mut payload = weatherapi_payload();
        payload["current"]["humidity"] = json!(82.4);
        let obs = normalize(&payload, "").unwrap();
        assert_eq!(obs.humidity_pct, Some(82));
    }

    #[test]
    fn test_non_numeric_temperature_is_an_error() {
        let mut payload = owm_payload();
        payload["main"]["temp"] = json!("warm");
        let err = normalize(&payload, "").unwrap_err();
        assert_eq!(err, NormalizeError::NotNumeric { field: "main.temp" });
    }

    #[test]
    fn test_negative_utc_offset_formatting() {
        assert_eq!(format_utc_offset(-18000), "-05:00");
        assert_eq!(format_utc_offset(19800), "+05:30");
        assert_eq!(format_utc_offset(0), "+00:00");
    }

    #[test]
    fn test_collected_at_is_stamped_at_normalization() {
        let before = Utc::now();
        let obs = normalize(&owm_payload(), "").unwrap();
        let after = Utc::now();
        assert!(obs.collected_at >= before && obs.collected_at <= after);
    }
}
