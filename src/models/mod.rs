pub mod record;
pub mod summary;

pub use record::{Observation, WeatherRecord};
pub use summary::{MetricStats, RunSummary, WeatherSummary};
