use serde::{Deserialize, Serialize};

/// Min/max/mean over the non-null values of one metric. Only produced when
/// at least one value was available; a metric with no values reports as
/// `None` in [`WeatherSummary`], never as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl MetricStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in values {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
            sum += v;
        }
        Some(Self {
            min,
            max,
            mean: sum / values.len() as f64,
        })
    }
}

/// Aggregate statistics over a set of persisted records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub count: usize,
    pub distinct_cities: usize,
    pub temperature_c: Option<MetricStats>,
    pub humidity_pct: Option<MetricStats>,
    pub pressure_hpa: Option<MetricStats>,
    pub wind_speed_ms: Option<MetricStats>,
}

impl WeatherSummary {
    pub fn render(&self) -> String {
        fn metric(name: &str, unit: &str, stats: &Option<MetricStats>) -> String {
            match stats {
                Some(s) => format!(
                    "{}: min {:.1}{u}, max {:.1}{u}, avg {:.1}{u}",
                    name,
                    s.min,
                    s.max,
                    s.mean,
                    u = unit
                ),
                None => format!("{}: no measurements", name),
            }
        }

        format!(
            "Records: {}\n\
            Cities: {}\n\
            {}\n\
            {}\n\
            {}\n\
            {}",
            self.count,
            self.distinct_cities,
            metric("Temperature", "°C", &self.temperature_c),
            metric("Humidity", "%", &self.humidity_pct),
            metric("Pressure", " hPa", &self.pressure_hpa),
            metric("Wind speed", " m/s", &self.wind_speed_ms),
        )
    }
}

/// Outcome of one pipeline run across all configured cities. Returned even
/// when every city failed; a run only errors on infrastructure failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub records_written: usize,
    pub records_rejected: usize,
    pub cities_failed: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} written, {} rejected, {} cities failed",
            self.records_written, self.records_rejected, self.cities_failed
        )
    }
}
